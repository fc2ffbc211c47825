// Copyright Facebook, Inc. 2019.

use std::fmt;

use failure::{Fail, Fallible};
use serde_derive::{Deserialize, Serialize};

pub const NODE_LENGTH: usize = 20;

/// An opaque 20-byte revision identifier.
///
/// `Node::null_id()` is the sentinel meaning "no such parent / revision".
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Node([u8; NODE_LENGTH]);

#[derive(Debug, Fail)]
#[fail(display = "Node Error: {:?}", _0)]
pub struct NodeError(String);

impl Node {
    pub fn null_id() -> &'static Node {
        static NULL: Node = Node([0; NODE_LENGTH]);
        &NULL
    }

    pub fn from_slice(bytes: &[u8]) -> Fallible<Self> {
        if bytes.len() != NODE_LENGTH {
            return Err(NodeError(format!(
                "invalid node length {:?}, expected {:?}",
                bytes.len(),
                NODE_LENGTH
            ))
            .into());
        }
        let mut buf = [0u8; NODE_LENGTH];
        buf.copy_from_slice(bytes);
        Ok(Node(buf))
    }

    pub fn is_null(&self) -> bool {
        self == Node::null_id()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    #[cfg(any(test, feature = "for-tests"))]
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        let mut buf = [0u8; NODE_LENGTH];
        rng.fill_bytes(&mut buf);
        Node(buf)
    }
}

impl AsRef<[u8]> for Node {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NODE_LENGTH]> for Node {
    fn from(buf: [u8; NODE_LENGTH]) -> Self {
        Node(buf)
    }
}

impl<'a> From<&'a [u8; NODE_LENGTH]> for Node {
    fn from(buf: &'a [u8; NODE_LENGTH]) -> Self {
        Node(*buf)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Node(\"{}\")", self.to_hex())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(any(test, feature = "for-tests"))]
use quickcheck::Arbitrary;

#[cfg(any(test, feature = "for-tests"))]
impl Arbitrary for Node {
    fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
        let mut buf = [0u8; NODE_LENGTH];
        g.fill_bytes(&mut buf);
        Node(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_null_id() {
        assert!(Node::null_id().is_null());
        assert_eq!(Node::null_id().as_ref(), &[0u8; NODE_LENGTH]);
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(Node::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let node = Node([7u8; NODE_LENGTH]);
        assert_eq!(node.to_hex(), "0707070707070707070707070707070707070707");
    }

    quickcheck::quickcheck! {
        fn test_from_slice_roundtrip(node: Node) -> bool {
            Node::from_slice(node.as_ref()).unwrap() == node
        }
    }
}
