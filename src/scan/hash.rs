//! Pluggable content-digest algorithm for the scanner (§4.4, §6
//! "Digest sizes").
//!
//! The scanner is generic over [`Hasher`] rather than hard-wired to one
//! algorithm, matching the three reverse-lookup widths
//! [`crate::cache::ReverseLookupMap`] supports: SHA-1 (20 bytes, the
//! default), MD5 (16 bytes), and SHA-256 (32 bytes).

use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use sha1::Digest as _Sha1DigestTrait;

use crate::entry::Digest;

/// A streaming content hasher. Implementations wrap a `*::Digest`-family
/// hasher from the `md-5`/`sha1`/`sha2` crates; the scanner creates a
/// fresh one per file via [`Hasher::new`].
pub trait Hasher: Send {
    fn new() -> Self
    where
        Self: Sized;
    fn write(&mut self, bytes: &[u8]);
    fn finish(self) -> Digest;
}

/// SHA-1 (20-byte digest). The scanner's default hash function.
#[derive(Default)]
pub struct Sha1Hasher(Sha1);

impl Hasher for Sha1Hasher {
    fn new() -> Self {
        Self(Sha1::new())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(self) -> Digest {
        Digest::from(self.0.finalize().to_vec())
    }
}

/// MD5 (16-byte digest). Offered as a faster, weaker alternate.
#[derive(Default)]
pub struct Md5Hasher(Md5);

impl Hasher for Md5Hasher {
    fn new() -> Self {
        Self(Md5::new())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(self) -> Digest {
        Digest::from(self.0.finalize().to_vec())
    }
}

/// SHA-256 (32-byte digest). Offered for deployments that want a
/// stronger collision bound than SHA-1.
#[derive(Default)]
pub struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn new() -> Self {
        Self(Sha256::new())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(self) -> Digest {
        Digest::from(self.0.finalize().to_vec())
    }
}
