// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Combines several `HistoryStore`s into one, querying them in order and
//! stopping at the first that answers. Used both to union the individual
//! packs discovered on disk and, by callers, to layer a local store over a
//! remote one.

use std::collections::HashMap;

use failure::Fallible;

use types::{Key, Node, NodeInfo};

use crate::historystore::HistoryStore;

pub struct UnionHistoryStore<T> {
    stores: Vec<T>,
}

impl<T: HistoryStore> UnionHistoryStore<T> {
    pub fn new() -> Self {
        UnionHistoryStore { stores: Vec::new() }
    }

    pub fn add(&mut self, store: T) {
        self.stores.push(store);
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }
}

impl<T: HistoryStore> Default for UnionHistoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HistoryStore> HistoryStore for UnionHistoryStore<T> {
    fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
        let mut remaining = keys.to_vec();
        for store in &self.stores {
            if remaining.is_empty() {
                break;
            }
            remaining = store.missing(&remaining)?;
        }
        Ok(remaining)
    }

    fn get_node_info(&self, key: &Key) -> Fallible<Option<NodeInfo>> {
        for store in &self.stores {
            if let Some(info) = store.get_node_info(key)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    fn get_ancestors(&self, key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>> {
        for store in &self.stores {
            if let Some(ancestors) = store.get_ancestors(key)? {
                return Ok(Some(ancestors));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::historypack::HistoryPack;
    use crate::mutablehistorypack::MutableHistoryPack;

    fn node(tail: u8) -> Node {
        let mut buf = [0u8; 20];
        buf[19] = tail;
        Node::from(buf)
    }

    fn pack_with(entries: &[(&[u8], Node, Node, Node, Node)]) -> HistoryPack {
        let tempdir = TempDir::new().unwrap();
        let mut mutpack = MutableHistoryPack::new(tempdir.path()).unwrap();
        for (name, n, p1, p2, link) in entries {
            mutpack.add(name, *n, *p1, *p2, *link).unwrap();
        }
        let base = mutpack.close().unwrap();
        // Leak the tempdir so the pack outlives this helper.
        std::mem::forget(tempdir);
        HistoryPack::new(&base).unwrap()
    }

    #[test]
    fn test_falls_through_to_second_store() {
        let null = *Node::null_id();
        let pack1 = pack_with(&[(b"a", node(1), null, null, node(101))]);
        let pack2 = pack_with(&[(b"b", node(2), null, null, node(102))]);

        let mut union = UnionHistoryStore::new();
        union.add(pack1);
        union.add(pack2);

        let key_a = Key::new(b"a".to_vec(), node(1));
        let key_b = Key::new(b"b".to_vec(), node(2));
        assert!(union.get_node_info(&key_a).unwrap().is_some());
        assert!(union.get_node_info(&key_b).unwrap().is_some());

        let missing = union.missing(&[key_a, key_b]).unwrap();
        assert!(missing.is_empty());
    }
}
