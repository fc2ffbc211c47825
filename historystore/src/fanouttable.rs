// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! The fanout table: a fixed 65 536-entry lookup accelerator keyed by the
//! first two bytes of a name-digest, shared by the index reader and writer.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use failure::Fallible;
use std::io::Write;

use types::Node;

use crate::codec::{FANOUT_ENTRIES, FANOUT_ENTRY_SIZE, FANOUT_SIZE};
use crate::sliceext::SliceExt;

/// The 2-byte prefix of a name-digest used to index into the fanout table.
pub fn fanout_key(name_hash: &Node) -> usize {
    BigEndian::read_u16(&name_hash.as_ref()[0..2]) as usize
}

/// Reads the fixed `FANOUT_SIZE`-byte fanout table out of `buf[0..FANOUT_SIZE]`.
pub fn read(buf: &[u8]) -> Fallible<Vec<u32>> {
    let raw = buf.get_err(0..FANOUT_SIZE)?;
    let mut table = Vec::with_capacity(FANOUT_ENTRIES);
    let mut cur = raw;
    for _ in 0..FANOUT_ENTRIES {
        table.push(cur.read_u32::<BigEndian>()?);
    }
    Ok(table)
}

/// Returns the half-open byte range `[start, end)`, relative to the end of
/// the fanout table, that the index bisection must search for `name_hash`.
/// `end` is `None` when `name_hash`'s prefix is the last fanout slot, in
/// which case the caller must search to the end of the index file.
pub fn bounds(table: &[u32], name_hash: &Node) -> (usize, Option<usize>) {
    let key = fanout_key(name_hash);
    let start = table[key] as usize;
    let end = if key + 1 < FANOUT_ENTRIES {
        Some(table[key + 1] as usize)
    } else {
        None
    };
    (start, end)
}

/// Builds the fanout table for a set of name-digests that have already been
/// sorted ascending, given the caller's index-entry size (so the resulting
/// offsets land on entry boundaries).
///
/// `table[k]` is the prefix sum of entry counts for every prefix `< k`, i.e.
/// the byte offset at which prefix `k`'s entries begin. This gives every
/// prefix — populated or not — an exact `[table[k], table[k+1])` range:
/// an empty prefix naturally yields `start == end`, and a populated prefix
/// keeps its full range even when the following prefix has no entries of
/// its own (simply filling empty slots with the previous slot's *start*
/// value collapses that case to a zero-width range and loses the entries).
pub fn build(sorted_name_hashes: &[Node], entry_size: usize) -> Vec<u32> {
    let mut counts = vec![0u32; FANOUT_ENTRIES];
    for name_hash in sorted_name_hashes {
        counts[fanout_key(name_hash)] += 1;
    }

    let mut table = Vec::with_capacity(FANOUT_ENTRIES);
    let mut running = 0u32;
    for count in counts {
        table.push(running);
        running += count * entry_size as u32;
    }
    table
}

pub fn write<W: Write>(writer: &mut W, table: &[u32]) -> Fallible<()> {
    debug_assert_eq!(table.len(), FANOUT_ENTRIES);
    let mut buf = Vec::with_capacity(FANOUT_SIZE);
    for &entry in table {
        buf.write_u32::<BigEndian>(entry)?;
    }
    debug_assert_eq!(buf.len(), FANOUT_SIZE);
    writer.write_all(&buf)?;
    Ok(())
}

#[allow(dead_code)]
const _CHECK_ENTRY_SIZE: usize = FANOUT_ENTRY_SIZE;
