// Copyright Facebook, Inc. 2019.

use serde_derive::{Deserialize, Serialize};

use crate::node::Node;

/// The in-memory payload associated with a `Key`: its two possible parent
/// nodes (either may be the null node) and the linknode of the commit that
/// introduced this revision.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct NodeInfo {
    pub parents: [Node; 2],
    pub linknode: Node,
}

impl NodeInfo {
    pub fn p1(&self) -> &Node {
        &self.parents[0]
    }

    pub fn p2(&self) -> &Node {
        &self.parents[1]
    }
}

#[cfg(any(test, feature = "for-tests"))]
use quickcheck::Arbitrary;

#[cfg(any(test, feature = "for-tests"))]
impl Arbitrary for NodeInfo {
    fn arbitrary<G: quickcheck::Gen>(g: &mut G) -> Self {
        NodeInfo {
            parents: [Node::arbitrary(g), Node::arbitrary(g)],
            linknode: Node::arbitrary(g),
        }
    }
}
