// Copyright Facebook, Inc. 2019.

//! The 20-byte cryptographic digest used both to hash file names for index
//! lookup and, as a streaming accumulator, to compute the pack's own
//! content digest as it is written (which becomes the pack pair's
//! on-disk basename).

use crypto::digest::Digest;
use crypto::sha1::Sha1;

use types::Node;

/// One-shot digest of a byte string, used to hash file names.
pub fn digest(value: &[u8]) -> Node {
    let mut hasher = Sha1::new();
    hasher.input(value);
    let mut buf: [u8; 20] = Default::default();
    hasher.result(&mut buf);
    Node::from(buf)
}

/// Streaming digest accumulator used by the mutable pack writer to hash the
/// pack's byte stream as it is written, without buffering the whole file.
pub struct StreamingHasher {
    inner: Sha1,
}

impl StreamingHasher {
    pub fn new() -> Self {
        StreamingHasher { inner: Sha1::new() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.input(bytes);
    }

    /// Consumes the hasher and returns the lowercase hex digest, used as the
    /// pack pair's content-addressed basename.
    pub fn finish_hex(mut self) -> String {
        self.inner.result_str()
    }
}
