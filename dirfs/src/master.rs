use crate::alloc::{self, Bitmap, Category};
use crate::error::{FSError, Result};
use crate::layout::{
    empty_block, Block, BLOCK_BITMAP_BYTES, INODE_BITMAP_BYTES, N_BLOCKS, N_INODES,
    ROOT_DIRECTORY_BLOCK, ROOT_INODE,
};

use std::mem::size_of;
use zerocopy::{AsBytes, FromBytes};

/// The first block of the file system, holding the allocation state of every
/// inode and every block. These two bitmaps are the only record of what is
/// free; nothing else on disk is consulted when allocating.
#[repr(C)]
#[derive(AsBytes, FromBytes, Clone, Copy, Debug, PartialEq)]
pub struct MasterBlock {
    /// One bit per inode, set iff the inode's type is not NONE.
    inode_allocated: [u8; INODE_BITMAP_BYTES],
    /// One bit per block, set iff the block is reserved or referenced by an inode.
    block_allocated: [u8; BLOCK_BITMAP_BYTES],
}

impl MasterBlock {
    /// A master block with nothing allocated.
    pub fn new() -> Self {
        Self {
            inode_allocated: [0; INODE_BITMAP_BYTES],
            block_allocated: [0; BLOCK_BITMAP_BYTES],
        }
    }

    /// The master block of a freshly formatted disk: the root inode plus the
    /// master block, inode table and root directory block are in use.
    pub fn formatted() -> Self {
        let mut master = Self::new();
        master.inodes_mut().set_reserved(ROOT_INODE as usize);
        for block in 0..=ROOT_DIRECTORY_BLOCK as usize {
            master.blocks_mut().set_reserved(block);
        }
        master
    }

    /// Reads the master block out of the leading bytes of a disk block.
    pub fn parse(buf: &Block) -> Result<Self> {
        Self::read_from(&buf[..size_of::<Self>()])
            .ok_or_else(|| FSError::Corrupt("master block layout".to_string()))
    }

    /// Serializes the master block into a full disk block, zero padded.
    pub fn serialize(&self) -> Block {
        let mut block = empty_block();
        block[..size_of::<Self>()].copy_from_slice(self.as_bytes());
        block
    }

    pub fn inodes(&self) -> Bitmap<&[u8]> {
        Bitmap::new(&self.inode_allocated[..], N_INODES)
    }

    pub fn inodes_mut(&mut self) -> Bitmap<&mut [u8]> {
        Bitmap::new(&mut self.inode_allocated[..], N_INODES)
    }

    pub fn blocks(&self) -> Bitmap<&[u8]> {
        Bitmap::new(&self.block_allocated[..], N_BLOCKS)
    }

    pub fn blocks_mut(&mut self) -> Bitmap<&mut [u8]> {
        Bitmap::new(&mut self.block_allocated[..], N_BLOCKS)
    }

    /// Claims the first free item of the given table.
    pub fn allocate(&mut self, category: Category) -> Result<usize> {
        match category {
            Category::Inode => alloc::find_and_set_bit(&mut self.inode_allocated, category),
            Category::Block => alloc::find_and_set_bit(&mut self.block_allocated, category),
        }
    }

    pub fn release(&mut self, category: Category, index: usize) {
        match category {
            Category::Inode => alloc::clear_bit(&mut self.inode_allocated, index),
            Category::Block => alloc::clear_bit(&mut self.block_allocated, index),
        }
    }
}

impl Default for MasterBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::State;

    #[test]
    fn formatted_master_reserves_system_blocks() {
        let master = MasterBlock::formatted();
        let block = master.serialize();

        // Inode bitmap: only the root.
        assert_eq!(&block[0..7], &[0x01, 0, 0, 0, 0, 0, 0]);
        // Block bitmap: blocks 0..=9.
        assert_eq!(block[7], 0xFF);
        assert_eq!(block[8], 0x03);
        assert!(block[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn can_encode_and_decode_master_block() {
        let mut master = MasterBlock::formatted();
        master.allocate(Category::Inode).unwrap();
        master.allocate(Category::Block).unwrap();

        let parsed = MasterBlock::parse(&master.serialize()).unwrap();

        assert_eq!(parsed, master);
        assert_eq!(parsed.inodes().get(1), State::Used);
        assert_eq!(parsed.blocks().get(10), State::Used);
    }

    #[test]
    fn release_returns_items_to_the_pool() {
        let mut master = MasterBlock::formatted();
        let inode = master.allocate(Category::Inode).unwrap();
        let block = master.allocate(Category::Block).unwrap();

        master.release(Category::Inode, inode);
        master.release(Category::Block, block);

        assert_eq!(master, MasterBlock::formatted());
    }

    #[test]
    fn releasing_a_free_item_keeps_it_free() {
        let mut master = MasterBlock::formatted();
        let block = master.allocate(Category::Block).unwrap();

        master.release(Category::Block, block);
        master.release(Category::Block, block);

        assert_eq!(master.blocks().get(block), State::Free);
        assert_eq!(master, MasterBlock::formatted());
    }

    #[test]
    fn allocation_fails_once_every_inode_is_taken() {
        let mut master = MasterBlock::formatted();
        for _ in 1..N_INODES {
            master.allocate(Category::Inode).unwrap();
        }
        match master.allocate(Category::Inode) {
            Err(FSError::NoFreeInode) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
