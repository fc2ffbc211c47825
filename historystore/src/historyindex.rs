// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Reads and writes the `.histidx` file: a fixed 65 536-entry fanout table
//! followed by index entries sorted ascending by name-digest.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use failure::Fallible;
use memmap::{Mmap, MmapOptions};

use types::Node;

use crate::codec::{IndexEntry, FANOUT_SIZE, INDEX_ENTRY_LENGTH};
use crate::error::HistoryPackError;
use crate::fanouttable;
use crate::sliceext::SliceExt;

pub struct HistoryIndex {
    mmap: Mmap,
    fanout: Vec<u32>,
}

impl HistoryIndex {
    pub fn new(path: &Path) -> Fallible<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < FANOUT_SIZE {
            return Err(HistoryPackError::Decode(format!(
                "histidx '{:?}' is truncated: {} bytes, expected at least {}",
                path, len, FANOUT_SIZE
            ))
            .into());
        }

        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };
        let fanout = fanouttable::read(&mmap)?;
        Ok(HistoryIndex { mmap, fanout })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Locates the index entry for `name_hash`, or `None` if it isn't present.
    pub fn get_entry(&self, name_hash: &Node) -> Fallible<Option<IndexEntry>> {
        let (start, end) = fanouttable::bounds(&self.fanout, name_hash);
        let start = start + FANOUT_SIZE;
        let end = end.map(|e| e + FANOUT_SIZE).unwrap_or_else(|| self.mmap.len());

        let slice = self.mmap.get_err(start..end)?;
        match bisect(slice, name_hash)? {
            Some(offset) => Ok(Some(IndexEntry::read(&slice[offset..])?)),
            None => Ok(None),
        }
    }

    pub fn write<W: Write>(writer: &mut W, sections: &[(Node, u64, u64)]) -> Fallible<()> {
        let mut sections = sections.to_vec();
        sections.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

        let hashes: Vec<Node> = sections.iter().map(|(h, _, _)| *h).collect();
        let fanout = fanouttable::build(&hashes, INDEX_ENTRY_LENGTH);
        fanouttable::write(writer, &fanout)?;

        for (name_hash, section_offset, section_length) in sections {
            IndexEntry {
                name_hash,
                section_offset,
                section_length,
            }
            .write(writer)?;
        }

        Ok(())
    }
}

/// Bisects `slice` (a run of 36-byte `IndexEntry` records) for `key`,
/// returning the byte offset of the matching entry within `slice`.
///
/// Scans by recomputing each candidate's position from the current `[start,
/// end)` bounds rather than by mutating a running cursor, so it can never
/// repeat the bug of comparing against a stale offset.
fn bisect(slice: &[u8], key: &Node) -> Fallible<Option<usize>> {
    let entry_count = slice.len() / INDEX_ENTRY_LENGTH;
    if slice.len() % INDEX_ENTRY_LENGTH != 0 {
        return Err(HistoryPackError::Decode(format!(
            "index region of length {} is not a multiple of the {} byte entry size",
            slice.len(),
            INDEX_ENTRY_LENGTH
        ))
        .into());
    }

    let mut lo = 0usize;
    let mut hi = entry_count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = mid * INDEX_ENTRY_LENGTH;
        let candidate = &slice[offset..offset + 20];
        match candidate.cmp(key.as_ref()) {
            std::cmp::Ordering::Equal => return Ok(Some(offset)),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    Ok(None)
}
