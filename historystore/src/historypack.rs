// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.
//
//! Reads a single `.histpack`/`.histidx` pair: the on-disk representation
//! of the revision history (parent pointers and linknodes) for a set of
//! file sections.
//!
//! ```text
//! .histpack
//!     histpack = <version: 1 byte>
//!                [<filesection>,...]
//!     filesection = <filename len: 2 byte unsigned int>
//!                   <filename>
//!                   [<record>,...]
//!     record = <node: 20 byte>
//!              <p1node: 20 byte>
//!              <p2node: 20 byte>
//!              <linknode: 20 byte>
//!
//!     Records within a section are stored children-before-parents
//!     (reverse-topological order).
//!
//! .histidx
//!     histidx = <fanouttable: 262144 bytes>
//!               <index>
//!     fanouttable = [<index offset: 4 byte unsigned int>,...] (65536 entries)
//!     index = [<index entry>,...] sorted ascending by name-digest
//!     indexentry = <name-digest: 20 byte>
//!                  <section offset: 8 byte unsigned int>
//!                  <section length: 8 byte unsigned int>
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use failure::Fallible;
use memmap::{Mmap, MmapOptions};

use types::{Key, Node, NodeInfo};

use crate::codec::PACK_RECORD_LENGTH;
use crate::error::HistoryPackError;
use crate::hash::digest;
use crate::historyindex::HistoryIndex;
use crate::historystore::HistoryStore;
use crate::{codec, sliceext::SliceExt};

const SUPPORTED_VERSION: u8 = 0;

pub struct HistoryPack {
    mmap: Mmap,
    index: HistoryIndex,
    pack_path: PathBuf,
    index_path: PathBuf,
}

/// The half-open byte range, within the pack, of one file section's records.
struct SectionLocation {
    record_start: usize,
    record_end: usize,
}

impl HistoryPack {
    pub fn new(base_path: &Path) -> Fallible<Self> {
        let pack_path = base_path.with_extension("histpack");
        let index_path = base_path.with_extension("histidx");

        let file = File::open(&pack_path)?;
        let len = file.metadata()?.len();
        if len < 1 {
            return Err(HistoryPackError::Decode(format!(
                "empty histpack '{:?}' is invalid",
                pack_path
            ))
            .into());
        }

        let mmap = unsafe { MmapOptions::new().len(len as usize).map(&file)? };
        let version = mmap[0];
        if version != SUPPORTED_VERSION {
            return Err(HistoryPackError::Decode(format!(
                "unsupported histpack version '{}'",
                version
            ))
            .into());
        }

        let index = HistoryIndex::new(&index_path)?;

        Ok(HistoryPack {
            mmap,
            index,
            pack_path,
            index_path,
        })
    }

    pub fn pack_path(&self) -> &Path {
        &self.pack_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn find_section(&self, name: &[u8]) -> Fallible<Option<SectionLocation>> {
        let name_hash = digest(name);
        let entry = match self.index.get_entry(&name_hash)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let offset = entry.section_offset as usize;
        let (actual_name, record_start) = codec::read_section_header(&self.mmap, offset)?;
        if actual_name != name {
            return Err(HistoryPackError::Collision {
                expected: name.to_vec(),
                actual: actual_name.to_vec(),
            }
            .into());
        }

        let header_len = record_start - offset;
        let section_length = entry.section_length as usize;
        if section_length < header_len {
            return Err(HistoryPackError::Decode(format!(
                "section length {} is smaller than its header ({} bytes)",
                section_length, header_len
            ))
            .into());
        }
        let record_end = record_start + (section_length - header_len);

        Ok(Some(SectionLocation {
            record_start,
            record_end,
        }))
    }

    fn find_record(&self, name: &[u8], node: &Node) -> Fallible<Option<codec::PackRecord>> {
        let section = match self.find_section(name)? {
            Some(section) => section,
            None => return Ok(None),
        };

        let mut offset = section.record_start;
        while offset + PACK_RECORD_LENGTH <= section.record_end {
            let record = codec::PackRecord::read(self.mmap.get_err(offset..offset + PACK_RECORD_LENGTH)?)?;
            if &record.node == node {
                return Ok(Some(record));
            }
            offset += PACK_RECORD_LENGTH;
        }
        Ok(None)
    }

    /// Returns the subset of `keys` this pack cannot answer.
    pub fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
        let mut missing = Vec::new();
        for key in keys {
            if self.find_record(key.name(), key.node())?.is_none() {
                missing.push(key.clone());
            }
        }
        Ok(missing)
    }

    pub fn parents(&self, name: &[u8], node: &Node) -> Fallible<(Node, Node)> {
        let record = self
            .find_record(name, node)?
            .ok_or_else(|| HistoryPackError::not_found(name, node))?;
        Ok((record.p1, record.p2))
    }

    pub fn linknode(&self, name: &[u8], node: &Node) -> Fallible<Node> {
        let record = self
            .find_record(name, node)?
            .ok_or_else(|| HistoryPackError::not_found(name, node))?;
        Ok(record.linknode)
    }

    /// Scans the section front-to-back, accumulating the ancestor frontier.
    /// Records are stored children-before-parents, so one forward pass
    /// collects the full closure the pack knows about.
    pub fn ancestors(&self, name: &[u8], node: &Node) -> Fallible<HashMap<Node, NodeInfo>> {
        let section = match self.find_section(name)? {
            Some(section) => section,
            None => return Err(HistoryPackError::not_found(name, node).into()),
        };

        let mut frontier: std::collections::HashSet<Node> = std::collections::HashSet::new();
        frontier.insert(*node);

        let mut results = HashMap::new();
        let mut offset = section.record_start;
        while offset + PACK_RECORD_LENGTH <= section.record_end {
            let record = codec::PackRecord::read(self.mmap.get_err(offset..offset + PACK_RECORD_LENGTH)?)?;
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
            offset += PACK_RECORD_LENGTH;
        }

        if results.is_empty() {
            return Err(HistoryPackError::not_found(name, node).into());
        }
        Ok(results)
    }
}

impl HistoryStore for HistoryPack {
    fn missing(&self, keys: &[Key]) -> Fallible<Vec<Key>> {
        HistoryPack::missing(self, keys)
    }

    fn get_node_info(&self, key: &Key) -> Fallible<Option<NodeInfo>> {
        match HistoryPack::parents(self, key.name(), key.node()) {
            Ok((p1, p2)) => {
                let linknode = HistoryPack::linknode(self, key.name(), key.node())?;
                Ok(Some(NodeInfo {
                    parents: [p1, p2],
                    linknode,
                }))
            }
            Err(e) => {
                if is_not_found(&e) {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    fn get_ancestors(&self, key: &Key) -> Fallible<Option<HashMap<Node, NodeInfo>>> {
        match HistoryPack::ancestors(self, key.name(), key.node()) {
            Ok(map) => Ok(Some(map)),
            Err(e) => {
                if is_not_found(&e) {
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }
}

pub(crate) fn is_not_found(e: &failure::Error) -> bool {
    matches!(e.downcast_ref::<HistoryPackError>(), Some(HistoryPackError::NotFound(_)))
}
