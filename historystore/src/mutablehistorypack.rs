// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Builds a single `.histpack`/`.histidx` pair in memory and publishes it
//! atomically: the pack is written to a temp file, renamed into place under
//! its content-addressed name, and only then is the index renamed into
//! place. A reader can never observe an index without its pack.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use failure::Fallible;
use tempfile::NamedTempFile;

use types::{Key, Node, NodeInfo};

use crate::codec;
use crate::error::HistoryPackError;
use crate::hash::{digest, StreamingHasher};
use crate::historyindex::HistoryIndex;
use crate::historystore::{HistoryStore, MutableHistoryStore};

const VERSION: u8 = 0;

struct Section {
    name: Vec<u8>,
    records: Vec<codec::PackRecord>,
}

pub struct MutableHistoryPack {
    dir: PathBuf,
    sections: Vec<Section>,
    section_index: HashMap<Vec<u8>, usize>,
    current_section: Option<Vec<u8>>,
    closed_sections: HashSet<Vec<u8>>,
    closed: bool,
}

impl MutableHistoryPack {
    pub fn new(dir: &Path) -> Fallible<Self> {
        Ok(MutableHistoryPack {
            dir: dir.to_path_buf(),
            sections: Vec::new(),
            section_index: HashMap::new(),
            current_section: None,
            closed_sections: HashSet::new(),
            closed: false,
        })
    }

    /// Records one revision. Callers should add a file's records in
    /// children-before-parents order so a single forward pass over the
    /// finished section is enough to walk the ancestor closure.
    ///
    /// All records for one file must be added before moving on to another;
    /// once a different name is added, the previous file's section is
    /// closed, and adding to it again is a client-protocol error.
    pub fn add(&mut self, name: &[u8], node: Node, p1: Node, p2: Node, linknode: Node) -> Fallible<()> {
        if name.len() > u16::max_value() as usize {
            return Err(HistoryPackError::ClientProtocol(format!(
                "file name of length {} exceeds the {} byte limit",
                name.len(),
                u16::max_value()
            ))
            .into());
        }

        if self.closed_sections.contains(name) {
            return Err(HistoryPackError::ClientProtocol(format!(
                "file section '{}' was already closed by an interleaved write",
                String::from_utf8_lossy(name)
            ))
            .into());
        }

        match &self.current_section {
            Some(current) if current.as_slice() == name => {}
            Some(current) => {
                self.closed_sections.insert(current.clone());
                self.current_section = Some(name.to_vec());
            }
            None => self.current_section = Some(name.to_vec()),
        }

        let record = codec::PackRecord { node, p1, p2, linknode };
        let idx = match self.section_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.sections.push(Section {
                    name: name.to_vec(),
                    records: Vec::new(),
                });
                let idx = self.sections.len() - 1;
                self.section_index.insert(name.to_vec(), idx);
                idx
            }
        };
        self.sections[idx].records.push(record);
        Ok(())
    }

    /// Serializes the accumulated sections, publishes the pack and index
    /// under their content-addressed name, and returns the base path
    /// (without extension) of the new pair.
    pub fn close(mut self) -> Fallible<PathBuf> {
        self.flush_pack()
    }

    fn flush_pack(&mut self) -> Fallible<PathBuf> {
        if self.closed {
            return Err(HistoryPackError::Decode("pack already closed".to_string()).into());
        }
        self.closed = true;

        let mut body = Vec::new();
        body.push(VERSION);

        let mut fanout_sections = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            let offset = body.len() as u64;
            codec::write_section_header(&mut body, &section.name)?;
            for record in &section.records {
                record.write(&mut body)?;
            }
            let length = body.len() as u64 - offset;
            fanout_sections.push((digest(&section.name), offset, length));
        }

        let mut hasher = StreamingHasher::new();
        hasher.update(&body);
        let base_name = hasher.finish_hex();
        let base_path = self.dir.join(&base_name);

        let mut pack_tmp = NamedTempFile::new_in(&self.dir)?;
        pack_tmp.write_all(&body)?;
        pack_tmp.flush()?;

        let mut index_buf = Vec::new();
        HistoryIndex::write(&mut index_buf, &fanout_sections)?;
        let mut index_tmp = NamedTempFile::new_in(&self.dir)?;
        index_tmp.write_all(&index_buf)?;
        index_tmp.flush()?;

        // Pack first, then index: a crash between the two renames leaves a
        // pack with no index, which readers that discover packs by scanning
        // for `.histidx` files simply never see.
        pack_tmp.persist(base_path.with_extension("histpack"))?;
        index_tmp.persist(base_path.with_extension("histidx"))?;

        Ok(base_path)
    }
}

impl HistoryStore for MutableHistoryPack {
    fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
        let mut missing = Vec::new();
        for key in keys {
            let found = self.section_index.get(key.name()).map_or(false, |&idx| {
                self.sections[idx]
                    .records
                    .iter()
                    .any(|r| &r.node == key.node())
            });
            if !found {
                missing.push(key.clone());
            }
        }
        Ok(missing)
    }

    fn get_node_info(&self, key: &Key) -> Fallible<Option<NodeInfo>> {
        let idx = match self.section_index.get(key.name()) {
            Some(idx) => *idx,
            None => return Ok(None),
        };
        Ok(self.sections[idx]
            .records
            .iter()
            .find(|r| &r.node == key.node())
            .map(|r| NodeInfo {
                parents: [r.p1, r.p2],
                linknode: r.linknode,
            }))
    }

    fn get_ancestors(&self, key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>> {
        let idx = match self.section_index.get(key.name()) {
            Some(idx) => *idx,
            None => return Ok(None),
        };

        let mut frontier = std::collections::HashSet::new();
        frontier.insert(*key.node());
        let mut results = HashMap::new();
        for record in &self.sections[idx].records {
            if frontier.contains(&record.node) {
                frontier.insert(record.p1);
                frontier.insert(record.p2);
                results.insert(
                    record.node,
                    NodeInfo {
                        parents: [record.p1, record.p2],
                        linknode: record.linknode,
                    },
                );
            }
        }
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(Some(results))
        }
    }
}

impl MutableHistoryStore for MutableHistoryPack {
    fn add(&mut self, key: &Key, info: &NodeInfo) -> Fallible<()> {
        MutableHistoryPack::add(self, key.name(), *key.node(), info.parents[0], info.parents[1], info.linknode)
    }

    fn flush(&mut self) -> Fallible<PathBuf> {
        let dir = self.dir.clone();
        let finished = std::mem::replace(
            self,
            MutableHistoryPack {
                dir,
                sections: Vec::new(),
                section_index: HashMap::new(),
                current_section: None,
                closed_sections: HashSet::new(),
                closed: false,
            },
        );
        finished.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(tail: u8) -> Node {
        let mut buf = [0u8; 20];
        buf[19] = tail;
        Node::from(buf)
    }

    #[test]
    fn test_add_and_close_creates_pair() {
        let tempdir = TempDir::new().unwrap();
        let mut pack = MutableHistoryPack::new(tempdir.path()).unwrap();
        pack.add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        let base = pack.close().unwrap();
        assert!(File::open(base.with_extension("histpack")).is_ok());
        assert!(File::open(base.with_extension("histidx")).is_ok());
    }

    #[test]
    fn test_in_memory_missing_before_close() {
        let tempdir = TempDir::new().unwrap();
        let mut pack = MutableHistoryPack::new(tempdir.path()).unwrap();
        pack.add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();

        let present = Key::new(b"a".to_vec(), node(1));
        let absent = Key::new(b"a".to_vec(), node(2));
        let missing = pack.missing(&[present, absent.clone()]).unwrap();
        assert_eq!(missing, vec![absent]);
    }

    #[test]
    fn test_interleaved_sections_are_a_client_protocol_error() {
        let tempdir = TempDir::new().unwrap();
        let mut pack = MutableHistoryPack::new(tempdir.path()).unwrap();
        pack.add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        pack.add(b"b", node(2), *Node::null_id(), *Node::null_id(), node(102))
            .unwrap();
        // "a"'s section was closed the moment "b" was added; reopening it
        // is a client-protocol error even though "a" was seen before.
        let err = pack
            .add(b"a", node(3), *Node::null_id(), *Node::null_id(), node(103))
            .unwrap_err();
        assert!(err
            .downcast_ref::<HistoryPackError>()
            .map_or(false, |e| matches!(e, HistoryPackError::ClientProtocol(_))));
    }

    #[test]
    fn test_content_addressed_name_is_deterministic() {
        let tempdir1 = TempDir::new().unwrap();
        let mut pack1 = MutableHistoryPack::new(tempdir1.path()).unwrap();
        pack1
            .add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        let base1 = pack1.close().unwrap();

        let tempdir2 = TempDir::new().unwrap();
        let mut pack2 = MutableHistoryPack::new(tempdir2.path()).unwrap();
        pack2
            .add(b"a", node(1), *Node::null_id(), *Node::null_id(), node(101))
            .unwrap();
        let base2 = pack2.close().unwrap();

        assert_eq!(
            base1.file_name().unwrap(),
            base2.file_name().unwrap()
        );
    }
}
