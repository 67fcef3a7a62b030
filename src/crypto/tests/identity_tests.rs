//! Integration tests for identity key material
//!
//! Tests:
//! - Generation for every supported algorithm
//! - Private/public encoding and peer id derivation
//! - Decoding hostile input

use cretoai_crypto::keys::{
    decode_private_key, encode_private_key, generate_private_key, Identity, KeyAlgorithm,
    PeerId, PrivateKey, PublicKey, DEFAULT_RSA_BITS,
};
use cretoai_crypto::CryptoError;
use ed25519_dalek::SigningKey;
use proptest::prelude::*;

#[test]
fn test_rsa_identity_generation() {
    let mut out = Vec::new();
    let identity = Identity::generate("rsa", DEFAULT_RSA_BITS, &mut out).unwrap();

    let progress = String::from_utf8(out).unwrap();
    assert!(progress.starts_with("generating 2048-bit RSA keypair...done\n"));

    let public = identity.private_key.public_key();
    assert_eq!(public.algorithm(), KeyAlgorithm::Rsa);
    assert_eq!(public.bits(), 2048);

    let restored = PrivateKey::decode(&identity.private_key.encode().unwrap()).unwrap();
    assert_eq!(restored, identity.private_key);
    assert_eq!(restored.peer_id().unwrap(), identity.peer_id);

    let public_restored = PublicKey::decode(&public.encode().unwrap()).unwrap();
    assert_eq!(public_restored, public);
}

#[test]
fn test_peer_id_is_stable_for_a_key() {
    let key = PrivateKey::Ed25519(SigningKey::from_bytes(&[42u8; 32]));
    let first = key.peer_id().unwrap();
    let second = Identity::from_private_key(key).unwrap().peer_id;
    assert_eq!(first, second);
    assert_eq!(first.to_string().parse::<PeerId>().unwrap(), first);
}

#[test]
fn test_peer_id_separates_algorithms() {
    // Same body bytes under different tags must not share an identity
    let ed = PeerId::from_encoded_public_key(&[KeyAlgorithm::Ed25519.tag(), 9, 9, 9]);
    let rsa = PeerId::from_encoded_public_key(&[KeyAlgorithm::Rsa.tag(), 9, 9, 9]);
    assert_ne!(ed, rsa);
}

#[test]
fn test_base64_config_form() {
    let key = generate_private_key(KeyAlgorithm::Ed25519, 0).unwrap();
    let encoded = encode_private_key(&key).unwrap();
    assert_eq!(decode_private_key(&encoded).unwrap(), key);

    // Whitespace from hand-edited config files is tolerated
    let padded = format!("  {}\n", encoded);
    assert_eq!(decode_private_key(&padded).unwrap(), key);
}

#[test]
fn test_decode_private_key_reports_malformed_material() {
    let err = decode_private_key("AQID").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKey(_) | CryptoError::Deserialization(_)));
}

proptest! {
    #[test]
    fn prop_ed25519_seed_round_trip(seed in proptest::array::uniform32(any::<u8>())) {
        let key = PrivateKey::Ed25519(SigningKey::from_bytes(&seed));
        let encoded = key.encode().unwrap();
        prop_assert_eq!(hex::encode(&encoded[1..]), hex::encode(seed));
        prop_assert_eq!(PrivateKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = PrivateKey::decode(&bytes);
        let _ = PublicKey::decode(&bytes);
    }
}
