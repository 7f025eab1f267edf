use std::fs;

use bitrat_core::{FileRecord, Processor};
use bitrat_hash::{DigestEngine, list_algorithms};
use tempfile::TempDir;

const INPUTS: [&[u8]; 3] = [b"hello", b"world", b"The quick brown fox jumps over the lazy dog"];

#[test]
fn test_every_algorithm_is_deterministic() {
    for name in list_algorithms() {
        let mut engine = DigestEngine::new(name, b"").unwrap();
        for input in INPUTS {
            let first = engine.hash_stream(input).unwrap();
            let second = engine.hash_stream(input).unwrap();
            assert_eq!(first, second, "{name}");
        }
        let a = engine.hash_stream(INPUTS[0]).unwrap();
        let b = engine.hash_stream(INPUTS[1]).unwrap();
        assert_ne!(a, b, "{name}");
    }
}

#[test]
fn test_keys_change_digests() {
    for name in list_algorithms() {
        let mut plain = DigestEngine::new(name, b"").unwrap();
        if !plain.algorithm().supports_key() {
            continue;
        }
        let unkeyed = plain.hash_stream(INPUTS[2]).unwrap();
        let first = DigestEngine::new(name, b"first key")
            .unwrap()
            .hash_stream(INPUTS[2])
            .unwrap();
        let second = DigestEngine::new(name, b"second key")
            .unwrap()
            .hash_stream(INPUTS[2])
            .unwrap();

        assert_ne!(first, second, "{name}");
        assert_ne!(first, unkeyed, "{name}");
        assert_ne!(second, unkeyed, "{name}");
    }
}

#[test]
fn test_known_vectors() {
    let cases = [
        ("md5", "5d41402abc4b2a76b9719d911017c592"),
        ("sha1", "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"),
        (
            "sha256",
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        ),
        (
            "blake3",
            "ea8f163db38682925e4491c5e58d4bb3506ef8c14eb78a86e908c5624a67200f",
        ),
    ];
    for (name, expected) in cases {
        let digest = DigestEngine::new(name, b"")
            .unwrap()
            .hash_stream(&b"hello"[..])
            .unwrap();
        assert_eq!(hex::encode(digest), expected, "{name}");
    }
}

#[test]
fn test_hmac_sha256_vector() {
    // RFC 4231 test case 2
    let mut engine = DigestEngine::new("sha256", b"Jefe").unwrap();
    let digest = engine
        .hash_stream(&b"what do ya want for nothing?"[..])
        .unwrap();
    assert_eq!(
        hex::encode(digest),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
    assert_eq!(engine.name(), "hmac-sha256");
}

#[test]
fn test_hmac_blake3_matches_rfc2104() {
    let key = b"secret";
    let message = b"hello";

    let mut inner_pad = [0x36u8; 64];
    let mut outer_pad = [0x5cu8; 64];
    for (i, byte) in key.iter().enumerate() {
        inner_pad[i] ^= byte;
        outer_pad[i] ^= byte;
    }
    let mut inner = blake3::Hasher::new();
    inner.update(&inner_pad).update(message);
    let mut outer = blake3::Hasher::new();
    outer.update(&outer_pad).update(inner.finalize().as_bytes());
    let expected = outer.finalize().to_hex().to_string();

    let mut engine = DigestEngine::new("blake3", key).unwrap();
    let digest = hex::encode(engine.hash_stream(&message[..]).unwrap());

    assert_eq!(digest, expected);
    assert!(digest.starts_with("150ce6b0"));
    assert!(digest.ends_with("7dd45a"));
    assert_eq!(engine.name(), "hmac-blake3");
}

#[test]
fn test_file_and_stream_agree() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("big.bin");
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&path, &content).unwrap();

    let mut engine = DigestEngine::new("blake2b", b"").unwrap();
    let from_stream = engine.hash_stream(&content[..]).unwrap();
    let record = engine.process(FileRecord::new(&path));

    assert_eq!(record.digest.as_deref(), Some(from_stream.as_slice()));
    assert_eq!(record.file.size, content.len() as u64);
    assert_eq!(record.algorithm, "blake2b");
}
