// Copyright Facebook, Inc. 2019.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2 or any later version.

//! Fixed binary layouts shared by the pack reader and the mutable pack
//! writer. Every function here is total over a correctly-sized slice; a
//! slice that is too short is a decode error, never a panic.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use failure::Fallible;
use std::io::{Cursor, Write};

use types::Node;

use crate::error::HistoryPackError;
use crate::sliceext::SliceExt;

pub const FANOUT_PREFIX_BYTES: usize = 2;
pub const FANOUT_ENTRIES: usize = 1 << (FANOUT_PREFIX_BYTES * 8);
pub const FANOUT_ENTRY_SIZE: usize = 4;
pub const FANOUT_SIZE: usize = FANOUT_ENTRIES * FANOUT_ENTRY_SIZE;

pub const NODE_LENGTH: usize = 20;
pub const INDEX_ENTRY_LENGTH: usize = NODE_LENGTH + 8 + 8;
pub const PACK_RECORD_LENGTH: usize = NODE_LENGTH * 4;

/// One entry in the sorted index region: `<name-digest><section offset><section length>`.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub name_hash: Node,
    pub section_offset: u64,
    pub section_length: u64,
}

impl IndexEntry {
    pub fn read(buf: &[u8]) -> Fallible<Self> {
        let buf = buf.get_err(0..INDEX_ENTRY_LENGTH)?;
        let name_hash = Node::from_slice(&buf[0..NODE_LENGTH])?;
        let mut cur = Cursor::new(&buf[NODE_LENGTH..]);
        let section_offset = cur.read_u64::<BigEndian>()?;
        let section_length = cur.read_u64::<BigEndian>()?;
        Ok(IndexEntry {
            name_hash,
            section_offset,
            section_length,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Fallible<()> {
        writer.write_all(self.name_hash.as_ref())?;
        writer.write_u64::<BigEndian>(self.section_offset)?;
        writer.write_u64::<BigEndian>(self.section_length)?;
        Ok(())
    }
}

/// One revision record in the pack: `<node><p1><p2><linknode>`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackRecord {
    pub node: Node,
    pub p1: Node,
    pub p2: Node,
    pub linknode: Node,
}

impl PackRecord {
    pub fn read(buf: &[u8]) -> Fallible<Self> {
        let buf = buf.get_err(0..PACK_RECORD_LENGTH)?;
        Ok(PackRecord {
            node: Node::from_slice(&buf[0..20])?,
            p1: Node::from_slice(&buf[20..40])?,
            p2: Node::from_slice(&buf[40..60])?,
            linknode: Node::from_slice(&buf[60..80])?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Fallible<()> {
        writer.write_all(self.node.as_ref())?;
        writer.write_all(self.p1.as_ref())?;
        writer.write_all(self.p2.as_ref())?;
        writer.write_all(self.linknode.as_ref())?;
        Ok(())
    }
}

/// Reads the `u16_be` name length + raw name bytes prefixing a file section.
/// Returns the name slice and the offset of the first byte past the header.
pub fn read_section_header(buf: &[u8], offset: usize) -> Fallible<(&[u8], usize)> {
    let len_buf = buf.get_err(offset..offset + 2)?;
    let name_len = (&len_buf[..]).read_u16::<BigEndian>()? as usize;
    let name = buf.get_err(offset + 2..offset + 2 + name_len)?;
    Ok((name, offset + 2 + name_len))
}

pub fn write_section_header<W: Write>(writer: &mut W, name: &[u8]) -> Fallible<()> {
    if name.len() > u16::max_value() as usize {
        return Err(HistoryPackError::ClientProtocol(format!(
            "file name of length {} exceeds the {} byte limit",
            name.len(),
            u16::max_value()
        ))
        .into());
    }
    writer.write_u16::<BigEndian>(name.len() as u16)?;
    writer.write_all(name)?;
    Ok(())
}
