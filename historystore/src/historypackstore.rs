// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Discovers every `.histidx`/`.histpack` pair in a directory and unions
//! them into a single `HistoryStore`. A pack that fails to open (a stray
//! temp file, a truncated index left by a crashed writer) is skipped and
//! logged rather than failing the whole store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use failure::Fallible;
use slog::{o, warn, Logger};

use types::{Key, Node, NodeInfo};

use crate::historypack::HistoryPack;
use crate::historystore::HistoryStore;
use crate::unionhistorystore::UnionHistoryStore;

pub struct HistoryPackStore {
    dir: PathBuf,
    logger: Logger,
    union: RwLock<UnionHistoryStore<HistoryPack>>,
}

impl HistoryPackStore {
    pub fn new(dir: impl AsRef<Path>, logger: &Logger) -> Fallible<Self> {
        let dir = dir.as_ref().to_path_buf();
        let logger = logger.new(o!("component" => "historypackstore"));
        let union = RwLock::new(Self::scan(&dir, &logger)?);
        Ok(HistoryPackStore { dir, logger, union })
    }

    fn scan(dir: &Path, logger: &Logger) -> Fallible<UnionHistoryStore<HistoryPack>> {
        let mut union = UnionHistoryStore::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(union),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("histidx") {
                continue;
            }
            let base_path = path.with_extension("");
            match HistoryPack::new(&base_path) {
                Ok(pack) => union.add(pack),
                Err(e) => warn!(logger, "skipping unreadable pack"; "path" => %path.display(), "error" => %e),
            }
        }
        Ok(union)
    }

    /// Re-discovers the packs under the store's directory, picking up any
    /// written since the store was opened or last rescanned.
    pub fn rescan(&self) -> Fallible<()> {
        let union = Self::scan(&self.dir, &self.logger)?;
        *self.union.write().unwrap() = union;
        Ok(())
    }

    pub fn pack_count(&self) -> usize {
        self.union.read().unwrap().len()
    }
}

impl HistoryStore for HistoryPackStore {
    fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
        self.union.read().unwrap().missing(keys)
    }

    fn get_node_info(&self, key: &Key) -> Fallible<Option<NodeInfo>> {
        self.union.read().unwrap().get_node_info(key)
    }

    fn get_ancestors(&self, key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>> {
        self.union.read().unwrap().get_ancestors(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Discard;
    use tempfile::TempDir;

    use crate::mutablehistorypack::MutableHistoryPack;

    fn node(tail: u8) -> Node {
        let mut buf = [0u8; 20];
        buf[19] = tail;
        Node::from(buf)
    }

    fn test_logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[test]
    fn test_discovers_multiple_packs() {
        let dir = TempDir::new().unwrap();

        let mut pack1 = MutableHistoryPack::new(dir.path()).unwrap();
        pack1
            .add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        pack1.close().unwrap();

        let mut pack2 = MutableHistoryPack::new(dir.path()).unwrap();
        pack2
            .add(b"b", node(2), *Node::null_id(), *Node::null_id(), node(102))
            .unwrap();
        pack2.close().unwrap();

        let store = HistoryPackStore::new(dir.path(), &test_logger()).unwrap();
        assert_eq!(store.pack_count(), 2);

        let key_a = Key::new(b"a".to_vec(), node(1));
        let key_b = Key::new(b"b".to_vec(), node(2));
        assert!(store.get_node_info(&key_a).unwrap().is_some());
        assert!(store.get_node_info(&key_b).unwrap().is_some());
    }

    #[test]
    fn test_rescan_picks_up_new_pack() {
        let dir = TempDir::new().unwrap();
        let store = HistoryPackStore::new(dir.path(), &test_logger()).unwrap();
        assert_eq!(store.pack_count(), 0);

        let mut pack = MutableHistoryPack::new(dir.path()).unwrap();
        pack.add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        pack.close().unwrap();

        store.rescan().unwrap();
        assert_eq!(store.pack_count(), 1);
    }

    #[test]
    fn test_empty_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = HistoryPackStore::new(dir.path(), &test_logger()).unwrap();
        assert_eq!(store.pack_count(), 0);
    }
}
