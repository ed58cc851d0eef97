use std::convert::TryFrom;
use std::mem::size_of;

use crate::error::{FSError, Result};
use crate::io::BlockNumber;
use crate::layout::{
    Block, BlockRef, InodeRef, BLOCKS_PER_INODE, INODES_PER_BLOCK, INODE_SIZE,
    INODE_TABLE_START, N_INODES, UNALLOCATED_BLOCK,
};

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InodeType {
    None,
    Directory,
    File,
}

impl InodeType {
    fn encode(self) -> u8 {
        match self {
            InodeType::None => 0,
            InodeType::Directory => 1,
            InodeType::File => 2,
        }
    }
}

impl TryFrom<u8> for InodeType {
    type Error = FSError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(InodeType::None),
            1 => Ok(InodeType::Directory),
            2 => Ok(InodeType::File),
            other => Err(FSError::Corrupt(format!("unknown inode type {}", other))),
        }
    }
}

/// On-disk encoding of an inode. Little endian, no padding.
#[repr(C)]
#[derive(AsBytes, FromBytes, Copy, Clone)]
struct RawInode {
    kind: u8,
    n_references: u8,
    data: [U16<LittleEndian>; BLOCKS_PER_INODE],
    size: U16<LittleEndian>,
}

const _: () = assert!(size_of::<RawInode>() == INODE_SIZE);

/// A file system object: its type, how many directory entries link to it, its
/// size and the blocks holding its data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Inode {
    pub kind: InodeType,
    pub link_count: u8,
    /// For a directory, the number of populated entries including `.` and `..`.
    pub size: u16,
    /// Direct block references, `UNALLOCATED_BLOCK` where unused.
    pub data: [BlockRef; BLOCKS_PER_INODE],
}

impl Inode {
    /// The all-zero record left behind by formatting and removal.
    pub fn free() -> Self {
        Self {
            kind: InodeType::None,
            link_count: 0,
            size: 0,
            data: [0; BLOCKS_PER_INODE],
        }
    }

    /// A fresh directory whose entries live in `block`, holding only `.` and `..`.
    pub fn directory(block: BlockRef) -> Self {
        let mut data = [UNALLOCATED_BLOCK; BLOCKS_PER_INODE];
        data[0] = block;
        Self {
            kind: InodeType::Directory,
            link_count: 1,
            size: 2,
            data,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == InodeType::Directory
    }

    pub fn is_allocated(&self) -> bool {
        self.kind != InodeType::None
    }

    /// The directory block of a directory inode.
    pub fn directory_block(&self) -> BlockRef {
        self.data[0]
    }

    fn decode(raw: &RawInode) -> Result<Self> {
        let mut data = [0; BLOCKS_PER_INODE];
        for (slot, block) in data.iter_mut().zip(raw.data.iter()) {
            *slot = block.get();
        }
        Ok(Self {
            kind: InodeType::try_from(raw.kind)?,
            link_count: raw.n_references,
            size: raw.size.get(),
            data,
        })
    }

    fn encode(&self) -> RawInode {
        let mut data = [U16::new(0); BLOCKS_PER_INODE];
        for (slot, &block) in data.iter_mut().zip(self.data.iter()) {
            *slot = U16::new(block);
        }
        RawInode {
            kind: self.kind.encode(),
            n_references: self.link_count,
            data,
            size: U16::new(self.size),
        }
    }
}

/// Finds the inode table block holding inode `i` and the record's slot in it.
pub fn locate(i: InodeRef) -> Result<(BlockNumber, usize)> {
    let i = i as usize;
    if i >= N_INODES {
        return Err(FSError::Corrupt(format!("inode reference {} out of range", i)));
    }
    Ok((
        i / INODES_PER_BLOCK + INODE_TABLE_START as usize,
        i % INODES_PER_BLOCK,
    ))
}

/// Reads the inode stored at `slot` of an inode table block.
pub fn read_slot(block: &Block, slot: usize) -> Result<Inode> {
    let offset = slot * INODE_SIZE;
    let raw = RawInode::read_from(&block[offset..offset + INODE_SIZE])
        .ok_or_else(|| FSError::Corrupt(format!("inode slot {}", slot)))?;
    Inode::decode(&raw)
}

/// Overwrites `slot` of an inode table block, leaving the other records untouched.
pub fn write_slot(block: &mut Block, slot: usize, inode: &Inode) {
    let offset = slot * INODE_SIZE;
    block[offset..offset + INODE_SIZE].copy_from_slice(inode.encode().as_bytes());
}
