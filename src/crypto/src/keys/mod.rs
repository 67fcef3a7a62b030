pub mod algorithm;
pub mod generation;
pub mod keypair;
pub mod peer_id;

pub use algorithm::{KeyAlgorithm, DEFAULT_RSA_BITS, MIN_RSA_BITS};
pub use generation::{check_key_size, decode_private_key, encode_private_key, generate_private_key, Identity};
pub use keypair::{PrivateKey, PublicKey};
pub use peer_id::PeerId;
