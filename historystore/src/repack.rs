// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Rewrites a set of source packs into a single compacted target pack,
//! preserving every answer the source could give (modulo rename cuts).
//!
//! For each file name present among the supplied roots:
//!   1. Union the ancestor maps reachable from every root of that file.
//!   2. Topologically sort, children before parents, breaking cycles by
//!      skipping already-visited nodes.
//!   3. Walk the order, pruning at `copyfrom` markers: a record whose `p1`
//!      is a rename cut is rewritten with `p1 = null-id`, and its parents
//!      are added to a do-not-process set so the pruned lineage above the
//!      cut is never written.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use failure::Fallible;
use slog::{info, o, Logger};

use types::{Key, Node, NodeInfo};

use crate::historystore::{Ancestor, HistoryStore, MutableHistoryStore};
use crate::mutablehistorypack::MutableHistoryPack;

/// Reads `source` starting from `roots`, and writes a single compacted
/// pack under `target_dir`. Returns the base path of the new pack.
pub fn run(
    source: &dyn HistoryStore,
    roots: &[Key],
    target_dir: &Path,
    logger: &Logger,
) -> Fallible<PathBuf> {
    let logger = logger.new(o!("component" => "historypack-repack"));

    let mut roots_by_file: HashMap<Vec<u8>, Vec<Node>> = HashMap::new();
    for key in roots {
        roots_by_file
            .entry(key.name().to_vec())
            .or_insert_with(Vec::new)
            .push(*key.node());
    }

    let mut writer = MutableHistoryPack::new(target_dir)?;
    let mut files_written = 0usize;

    for (name, file_roots) in &roots_by_file {
        let mut ancestors: HashMap<Node, Ancestor> = HashMap::new();
        for root in file_roots {
            let key = Key::new(name.clone(), *root);
            match source.get_ancestors_with_copyfrom(&key)? {
                Some(map) => ancestors.extend(map),
                None => {
                    info!(logger, "skipping unknown root"; "name" => String::from_utf8_lossy(name).to_string(), "node" => %root);
                }
            }
        }

        if ancestors.is_empty() {
            continue;
        }

        let order = topo_sort_children_first(&ancestors);

        let mut do_not_process: HashSet<Node> = HashSet::new();
        for node in order {
            let ancestor = &ancestors[&node];

            if do_not_process.contains(&node) {
                do_not_process.insert(ancestor.info.parents[0]);
                do_not_process.insert(ancestor.info.parents[1]);
                continue;
            }

            if ancestor.copyfrom {
                do_not_process.insert(ancestor.info.parents[0]);
                do_not_process.insert(ancestor.info.parents[1]);
                writer.add(
                    name,
                    node,
                    *Node::null_id(),
                    ancestor.info.parents[1],
                    ancestor.info.linknode,
                )?;
            } else {
                writer.add(
                    name,
                    node,
                    ancestor.info.parents[0],
                    ancestor.info.parents[1],
                    ancestor.info.linknode,
                )?;
            }
        }

        files_written += 1;
        info!(logger, "repacked file"; "name" => String::from_utf8_lossy(name).to_string());
    }

    info!(logger, "repack complete"; "files" => files_written);
    writer.close()
}

/// Returns `ancestors`' keys ordered so every node comes before its
/// parents, breaking cycles (a self-loop or divergence back to an
/// already-emitted node) by skipping the repeat rather than looping.
fn topo_sort_children_first(ancestors: &HashMap<Node, Ancestor>) -> Vec<Node> {
    let mut order = Vec::with_capacity(ancestors.len());
    let mut visited = HashSet::new();

    // Parents-before-children postorder, then reversed: visiting a node's
    // parents before appending the node itself yields parents-first;
    // reversing gives the children-before-parents order the pack format
    // requires.
    for &root in ancestors.keys() {
        visit(root, ancestors, &mut visited, &mut order);
    }
    order.reverse();
    order
}

fn visit(node: Node, ancestors: &HashMap<Node, Ancestor>, visited: &mut HashSet<Node>, order: &mut Vec<Node>) {
    if !visited.insert(node) {
        return;
    }
    if let Some(ancestor) = ancestors.get(&node) {
        for &parent in &ancestor.info.parents {
            if !parent.is_null() && ancestors.contains_key(&parent) {
                visit(parent, ancestors, visited, order);
            }
        }
    }
    order.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Discard;
    use tempfile::TempDir;

    use crate::historypack::HistoryPack;
    use crate::mutablehistorypack::MutableHistoryPack as Writer;

    fn node(tail: u8) -> Node {
        let mut buf = [0u8; 20];
        buf[19] = tail;
        Node::from(buf)
    }

    fn test_logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[test]
    fn test_repack_single_file_preserves_ancestry() {
        let source_dir = TempDir::new().unwrap();
        let null = *Node::null_id();

        let mut pack1 = Writer::new(source_dir.path()).unwrap();
        pack1.add(b"f", node(1), null, null, node(101)).unwrap();
        pack1.close().unwrap();

        let mut pack2 = Writer::new(source_dir.path()).unwrap();
        pack2.add(b"f", node(2), node(1), null, node(102)).unwrap();
        pack2.close().unwrap();

        let mut pack3 = Writer::new(source_dir.path()).unwrap();
        pack3.add(b"f", node(3), node(2), null, node(103)).unwrap();
        pack3.close().unwrap();

        let source = crate::historypackstore::HistoryPackStore::new(source_dir.path(), &test_logger()).unwrap();

        let target_dir = TempDir::new().unwrap();
        let root = Key::new(b"f".to_vec(), node(3));
        let base = run(&source, &[root], target_dir.path(), &test_logger()).unwrap();

        let target_pack = HistoryPack::new(&base).unwrap();
        let ancestors = target_pack.ancestors(b"f", &node(3)).unwrap();
        assert_eq!(ancestors.len(), 3);
        assert_eq!(target_pack.linknode(b"f", &node(1)).unwrap(), node(101));
    }

    #[test]
    fn test_repack_merges_two_sources() {
        let source_dir = TempDir::new().unwrap();
        let null = *Node::null_id();

        let mut pack1 = Writer::new(source_dir.path()).unwrap();
        pack1.add(b"f", node(2), node(1), null, node(102)).unwrap();
        pack1.add(b"f", node(1), null, null, node(101)).unwrap();
        pack1.close().unwrap();

        let mut pack2 = Writer::new(source_dir.path()).unwrap();
        pack2.add(b"f", node(3), node(2), null, node(103)).unwrap();
        pack2.close().unwrap();

        let source = crate::historypackstore::HistoryPackStore::new(source_dir.path(), &test_logger()).unwrap();

        let target_dir = TempDir::new().unwrap();
        let root = Key::new(b"f".to_vec(), node(3));
        let base = run(&source, &[root], target_dir.path(), &test_logger()).unwrap();

        let target_pack = HistoryPack::new(&base).unwrap();
        let ancestors = target_pack.ancestors(b"f", &node(3)).unwrap();
        assert_eq!(ancestors.len(), 3);
    }

    #[test]
    fn test_copyfrom_cut_nulls_p1() {
        struct FakeCopyFromSource;
        impl HistoryStore for FakeCopyFromSource {
            fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
                Ok(keys.to_vec())
            }
            fn get_node_info(&self, _key: &Key) -> Fallible<Option<NodeInfo>> {
                Ok(None)
            }
            fn get_ancestors(&self, _key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>> {
                Ok(None)
            }
            fn get_ancestors_with_copyfrom(&self, key: &Key) -> Fallible<Option<HashMap<Node, Ancestor>>> {
                if key.node() != &node(2) {
                    return Ok(None);
                }
                let null = *Node::null_id();
                let mut map = HashMap::new();
                map.insert(
                    node(2),
                    Ancestor {
                        info: NodeInfo { parents: [node(1), null], linknode: node(102) },
                        copyfrom: true,
                    },
                );
                map.insert(
                    node(1),
                    Ancestor {
                        info: NodeInfo { parents: [null, null], linknode: node(101) },
                        copyfrom: false,
                    },
                );
                Ok(Some(map))
            }
        }

        let source = FakeCopyFromSource;
        let target_dir = TempDir::new().unwrap();
        let root = Key::new(b"f".to_vec(), node(2));
        let base = run(&source, &[root], target_dir.path(), &test_logger()).unwrap();

        let target_pack = HistoryPack::new(&base).unwrap();
        let (p1, _p2) = target_pack.parents(b"f", &node(2)).unwrap();
        assert!(p1.is_null());

        // The rename ancestor above the cut was pruned out of the target.
        assert!(target_pack.parents(b"f", &node(1)).is_err());
    }
}
