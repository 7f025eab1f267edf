//! Static registry of supported digest algorithms.
//!
//! Every entry maps a name to one of four constructor shapes. The shape is
//! resolved once, when an engine is built; per-file hashing only ever
//! touches the resulting [`RunningHash`].

use std::mem;

use digest::Digest;
use digest::consts::{U32, U64};
use digest::core_api::BlockSizeUser;
use hmac::{Mac, SimpleHmac};
use skein::Skein512;

/// Stateful hash running over one file at a time.
pub trait RunningHash: Send {
    /// Feed more bytes.
    fn update(&mut self, data: &[u8]);

    /// Produce the digest and return to the initial (keyed) state.
    fn finish_reset(&mut self) -> Vec<u8>;

    /// Clone into an independent instance with the same state.
    fn box_clone(&self) -> Box<dyn RunningHash>;
}

type Build = fn() -> Box<dyn RunningHash>;
type BuildKeyed = fn(&[u8]) -> Result<Box<dyn RunningHash>, String>;
type BuildSized = fn(usize) -> Result<Box<dyn RunningHash>, String>;

/// How an algorithm is constructed.
#[derive(Clone, Copy)]
pub(crate) enum Shape {
    /// Unkeyed only.
    Plain(Build),
    /// Native keyed mode. `inherent` algorithms are always keyed, even by
    /// an empty key.
    KeyedNative { build: BuildKeyed, inherent: bool },
    /// No native keying: wrapped in HMAC when a key is supplied.
    HmacWrapped { plain: Build, hmac: BuildKeyed },
    /// Family parameterised by digest length. No keyed mode.
    Sized { build: BuildSized, length: usize },
}

/// One registry entry.
#[derive(Clone, Copy)]
pub struct Algorithm {
    /// Registry name.
    pub name: &'static str,
    pub(crate) shape: Shape,
}

impl Algorithm {
    /// Check whether this algorithm is keyed even without a key.
    pub fn is_inherently_keyed(&self) -> bool {
        matches!(self.shape, Shape::KeyedNative { inherent: true, .. })
    }

    /// Check whether this algorithm accepts a key at all.
    pub fn supports_key(&self) -> bool {
        !matches!(self.shape, Shape::Plain(_) | Shape::Sized { .. })
    }

    /// Construct a running hash for `key` (empty means unkeyed).
    pub(crate) fn instantiate(&self, key: &[u8]) -> Result<Box<dyn RunningHash>, String> {
        match self.shape {
            Shape::Plain(build) if key.is_empty() => Ok(build()),
            Shape::Plain(_) => Err("algorithm has no keyed mode".to_string()),
            Shape::KeyedNative { build, .. } => build(key),
            Shape::HmacWrapped { plain, .. } if key.is_empty() => Ok(plain()),
            Shape::HmacWrapped { hmac, .. } => hmac(key),
            Shape::Sized { build, length } if key.is_empty() => build(length),
            Shape::Sized { .. } => Err("algorithm has no keyed mode".to_string()),
        }
    }
}

impl std::fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.name)
            .field("keyed", &self.supports_key())
            .finish()
    }
}

macro_rules! hmac_wrapped {
    ($name:literal, $digest:ty) => {
        Algorithm {
            name: $name,
            shape: Shape::HmacWrapped {
                plain: plain_digest::<$digest>,
                hmac: hmac_digest::<$digest>,
            },
        }
    };
}

macro_rules! keyed_native {
    ($name:literal, $build:expr) => {
        Algorithm {
            name: $name,
            shape: Shape::KeyedNative { build: $build, inherent: false },
        }
    };
}

/// Registry entries, sorted by name.
static ALGORITHMS: &[Algorithm] = &[
    keyed_native!("blake2b", |key| blake2b(64, key)),
    keyed_native!("blake2b-256", |key| blake2b(32, key)),
    keyed_native!("blake2b-384", |key| blake2b(48, key)),
    keyed_native!("blake2b-512", |key| blake2b(64, key)),
    keyed_native!("blake2s-128", |key| blake2s(16, key)),
    keyed_native!("blake2s-256", |key| blake2s(32, key)),
    hmac_wrapped!("blake3", blake3::Hasher),
    Algorithm {
        name: "blake3-dk",
        shape: Shape::KeyedNative { build: blake3_derive_key, inherent: true },
    },
    Algorithm {
        name: "crc32",
        shape: Shape::Plain(crc32),
    },
    hmac_wrapped!("md5", md5::Md5),
    hmac_wrapped!("ripemd160", ripemd::Ripemd160),
    hmac_wrapped!("sha1", sha1::Sha1),
    hmac_wrapped!("sha224", sha2::Sha224),
    hmac_wrapped!("sha256", sha2::Sha256),
    hmac_wrapped!("sha3-224", sha3::Sha3_224),
    hmac_wrapped!("sha3-256", sha3::Sha3_256),
    hmac_wrapped!("sha3-384", sha3::Sha3_384),
    hmac_wrapped!("sha3-512", sha3::Sha3_512),
    hmac_wrapped!("sha384", sha2::Sha384),
    hmac_wrapped!("sha512", sha2::Sha512),
    hmac_wrapped!("sha512-256", sha2::Sha512_256),
    Algorithm {
        name: "skein-256",
        shape: Shape::Sized { build: skein512, length: 32 },
    },
    Algorithm {
        name: "skein-512",
        shape: Shape::Sized { build: skein512, length: 64 },
    },
];

/// Look up an algorithm by registry name.
pub fn lookup(name: &str) -> Option<&'static Algorithm> {
    ALGORITHMS.iter().find(|a| a.name == name)
}

/// Names of all supported algorithms, sorted.
pub fn list_algorithms() -> impl Iterator<Item = &'static str> {
    ALGORITHMS.iter().map(|a| a.name)
}

// ---------------------------------------------------------------------------
// RustCrypto digests
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct PlainDigest<D>(D);

impl<D> RunningHash for PlainDigest<D>
where
    D: Digest + Clone + Send + 'static,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        mem::replace(&mut self.0, D::new()).finalize().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn plain_digest<D>() -> Box<dyn RunningHash>
where
    D: Digest + Clone + Send + 'static,
{
    Box::new(PlainDigest(D::new()))
}

/// HMAC state plus a copy of the freshly keyed state to reset to.
#[derive(Clone)]
struct HmacDigest<D: Digest + BlockSizeUser + Clone> {
    fresh: SimpleHmac<D>,
    state: SimpleHmac<D>,
}

impl<D> RunningHash for HmacDigest<D>
where
    D: Digest + BlockSizeUser + Clone + Send + 'static,
{
    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.state, data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        let done = mem::replace(&mut self.state, self.fresh.clone());
        done.finalize().into_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn hmac_digest<D>(key: &[u8]) -> Result<Box<dyn RunningHash>, String>
where
    D: Digest + BlockSizeUser + Clone + Send + 'static,
{
    let fresh = <SimpleHmac<D> as Mac>::new_from_slice(key).map_err(|e| e.to_string())?;
    Ok(Box::new(HmacDigest {
        state: fresh.clone(),
        fresh,
    }))
}

// ---------------------------------------------------------------------------
// CRC-32
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Crc32(crc32fast::Hasher);

impl RunningHash for Crc32 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        let sum = mem::replace(&mut self.0, crc32fast::Hasher::new()).finalize();
        sum.to_be_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn crc32() -> Box<dyn RunningHash> {
    Box::new(Crc32(crc32fast::Hasher::new()))
}

// ---------------------------------------------------------------------------
// BLAKE3
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Blake3(blake3::Hasher);

impl RunningHash for Blake3 {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        let hash = blake3::Hasher::finalize(&self.0);
        self.0.reset();
        hash.as_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn blake3_derive_key(key: &[u8]) -> Result<Box<dyn RunningHash>, String> {
    let context = std::str::from_utf8(key).map_err(|_| "context must be valid UTF-8".to_string())?;
    Ok(Box::new(Blake3(blake3::Hasher::new_derive_key(context))))
}

// ---------------------------------------------------------------------------
// Skein
// ---------------------------------------------------------------------------

fn skein512(length: usize) -> Result<Box<dyn RunningHash>, String> {
    match length {
        32 => Ok(plain_digest::<Skein512<U32>>()),
        64 => Ok(plain_digest::<Skein512<U64>>()),
        other => Err(format!("no skein variant with a {other}-byte digest")),
    }
}

// ---------------------------------------------------------------------------
// BLAKE2
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Blake2b {
    params: blake2b_simd::Params,
    state: blake2b_simd::State,
}

impl RunningHash for Blake2b {
    fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        let hash = self.state.finalize();
        self.state = self.params.to_state();
        hash.as_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn blake2b(length: usize, key: &[u8]) -> Result<Box<dyn RunningHash>, String> {
    if key.len() > blake2b_simd::KEYBYTES {
        return Err(format!(
            "key is {} bytes, at most {} allowed",
            key.len(),
            blake2b_simd::KEYBYTES
        ));
    }
    let mut params = blake2b_simd::Params::new();
    params.hash_length(length).key(key);
    Ok(Box::new(Blake2b {
        state: params.to_state(),
        params,
    }))
}

#[derive(Clone)]
struct Blake2s {
    params: blake2s_simd::Params,
    state: blake2s_simd::State,
}

impl RunningHash for Blake2s {
    fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    fn finish_reset(&mut self) -> Vec<u8> {
        let hash = self.state.finalize();
        self.state = self.params.to_state();
        hash.as_bytes().to_vec()
    }

    fn box_clone(&self) -> Box<dyn RunningHash> {
        Box::new(self.clone())
    }
}

fn blake2s(length: usize, key: &[u8]) -> Result<Box<dyn RunningHash>, String> {
    if key.len() > blake2s_simd::KEYBYTES {
        return Err(format!(
            "key is {} bytes, at most {} allowed",
            key.len(),
            blake2s_simd::KEYBYTES
        ));
    }
    let mut params = blake2s_simd::Params::new();
    params.hash_length(length).key(key);
    Ok(Box::new(Blake2s {
        state: params.to_state(),
        params,
    }))
}
