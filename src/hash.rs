//! Pluggable content hashing: a fast non-cryptographic default plus three
//! cryptographic algorithms for callers who need stronger collision
//! resistance than a 64-bit hash provides.

use crate::config::HashAlgorithm;
use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// A streaming hasher over one of the four supported algorithms. Kept as an
/// enum rather than a trait object so `update` stays monomorphized per
/// algorithm on the hot path.
pub enum StreamingHasher {
    Fast(XxHash64),
    Sha1(Sha1),
    Sha256(Sha256),
    Md5(Md5),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::FastNonCryptographic64 => StreamingHasher::Fast(XxHash64::with_seed(0)),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamingHasher::Fast(h) => h.write(bytes),
            StreamingHasher::Sha1(h) => Digest::update(h, bytes),
            StreamingHasher::Sha256(h) => Digest::update(h, bytes),
            StreamingHasher::Md5(h) => Digest::update(h, bytes),
        }
    }

    pub fn finish_hex(self) -> String {
        match self {
            StreamingHasher::Fast(h) => format!("{:016x}", h.finish()),
            StreamingHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}
