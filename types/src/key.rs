// Copyright Facebook, Inc. 2019.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::node::Node;

/// Identifies a single revision record: a file name together with the
/// node (revision-id) of that file.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Key {
    pub name: Box<[u8]>,
    pub node: Node,
}

impl Key {
    pub fn new(name: impl Into<Box<[u8]>>, node: Node) -> Self {
        Key {
            name: name.into(),
            node,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Key {{ name: {:?}, node: {:?} }}",
            String::from_utf8_lossy(&self.name),
            self.node
        )
    }
}

#[cfg(any(test, feature = "for-tests"))]
use quickcheck::Arbitrary;

#[cfg(any(test, feature = "for-tests"))]
impl Arbitrary for Key {
    fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
        let name: Vec<u8> = Vec::arbitrary(g);
        Key::new(name, Node::arbitrary(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let key = Key::new(b"path/to/file".to_vec(), *Node::null_id());
        assert_eq!(key.name(), b"path/to/file");
        assert_eq!(key.node(), Node::null_id());
    }
}
