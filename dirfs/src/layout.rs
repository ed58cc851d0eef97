//! Disk geometry shared by every image this crate formats or opens.
//!
//! # Layout
//! ==========================================================================
//! | Master Block | Inode Table (8 blocks) | Root Directory | Data Region   |
//! | block 0      | blocks 1..=8           | block 9        | blocks 10..128 |
//! ==========================================================================
//!
//! All values are fixed at format time. Changing any of them produces images
//! that are not interchangeable with ones written by a differently configured
//! build.

/// Bytes per disk block.
pub const BLOCK_SIZE: usize = 256;
/// Total blocks in a virtual disk, including the master block and inode table.
pub const N_BLOCKS: usize = 128;

/// Direct data block references carried by every inode. There are no indirect
/// blocks.
pub const BLOCKS_PER_INODE: usize = 15;
/// Encoded size of one inode record.
pub const INODE_SIZE: usize = 34;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
/// Total inodes available in the file system, the upper bound on how many
/// directories can exist (root included).
pub const N_INODES: usize = 56;
pub const N_INODE_BLOCKS: usize = (N_INODES + INODES_PER_BLOCK - 1) / INODES_PER_BLOCK;

/// Name buffer of a directory entry, NUL padded.
pub const FILE_NAME_SIZE: usize = 14;
/// Longest name that still leaves room for the terminating NUL.
pub const MAX_NAME_LENGTH: usize = FILE_NAME_SIZE - 1;
pub const DIRECTORY_ENTRY_SIZE: usize = 16;
pub const DIRECTORY_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRECTORY_ENTRY_SIZE;

pub const MAX_PATH_LENGTH: usize = 200;

pub const INODE_BITMAP_BYTES: usize = (N_INODES + 7) / 8;
pub const BLOCK_BITMAP_BYTES: usize = (N_BLOCKS + 7) / 8;

/// On-disk reference to a block.
pub type BlockRef = u16;
/// On-disk reference to an inode, an index into the inode table.
pub type InodeRef = u16;
/// Raw contents of one disk block.
pub type Block = [u8; BLOCK_SIZE];

/// Known locations.
pub const MASTER_BLOCK: BlockRef = 0;
pub const INODE_TABLE_START: BlockRef = 1;
pub const ROOT_DIRECTORY_BLOCK: BlockRef = INODE_TABLE_START + N_INODE_BLOCKS as BlockRef;
pub const ROOT_INODE: InodeRef = 0;

pub const UNALLOCATED_BLOCK: BlockRef = 0xFFFF;
pub const UNALLOCATED_INODE: InodeRef = 0xFFFF;

/// Returns a zeroed block buffer.
pub fn empty_block() -> Block {
    [0; BLOCK_SIZE]
}
