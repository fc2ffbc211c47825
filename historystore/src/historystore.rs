// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The capability traits implemented by every history-pack-backed store:
//! a single on-disk pack, the multi-pack union, and (for writers) the
//! mutable pack under construction.

use std::collections::HashMap;

use failure::Fallible;

use types::{Key, Node, NodeInfo};

/// One ancestor entry as seen by the repacker: the usual parents/linknode
/// payload, plus an out-of-band marker for whether `p1` is a rename from a
/// different file and should be cut during repack. The marker never reaches
/// the on-disk record; it only controls how `p1` is rewritten before the
/// record is re-added to the target pack.
#[derive(Clone, Debug, PartialEq)]
pub struct Ancestor {
    pub info: NodeInfo,
    pub copyfrom: bool,
}

/// Read access to revision history, regardless of how many underlying
/// packs back it.
pub trait HistoryStore {
    /// Returns the subset of `keys` this store cannot answer.
    fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>>;

    /// The parents and linknode of a single revision, or `None` if unknown.
    fn get_node_info(&self, key: &Key) -> Fallible<Option<NodeInfo>>;

    /// The full ancestor closure this store can walk to starting at `key`,
    /// or `None` if `key` itself isn't known.
    fn get_ancestors(&self, key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>>;

    /// Like `get_ancestors`, but carrying the repacker's copy-from marker.
    /// Packs never record renames themselves, so the default implementation
    /// reports `copyfrom: false` for everything; a source that tracks
    /// renames out-of-band can override this.
    fn get_ancestors_with_copyfrom(&self, key: &Key) -> Fallible<Option<HashMap<Node, Ancestor>>> {
        Ok(self.get_ancestors(key)?.map(|ancestors| {
            ancestors
                .into_iter()
                .map(|(node, info)| (node, Ancestor { info, copyfrom: false }))
                .collect()
        }))
    }
}

/// Write access used while constructing a new pack.
pub trait MutableHistoryStore: HistoryStore {
    fn add(&mut self, key: &Key, info: &NodeInfo) -> Fallible<()>;

    /// Flushes and publishes the pack, returning the base path (without
    /// extension) of the resulting `.histpack`/`.histidx` pair.
    fn flush(&mut self) -> Fallible<std::path::PathBuf>;
}
