//! Fixed-layout directory blocks.
//!
//! Every directory owns exactly one block holding `DIRECTORY_ENTRIES_PER_BLOCK`
//! entries. Slot 0 is always `.` (the directory itself) and slot 1 is always `..`
//! (its parent); the remaining slots are either free or name a child.

use std::borrow::Cow;
use std::mem::size_of;

use crate::error::{FSError, Result};
use crate::layout::{
    Block, InodeRef, BLOCK_SIZE, DIRECTORY_ENTRIES_PER_BLOCK, DIRECTORY_ENTRY_SIZE,
    FILE_NAME_SIZE, MAX_NAME_LENGTH, UNALLOCATED_INODE,
};

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes};

pub const SELF_NAME: &str = ".";
pub const PARENT_NAME: &str = "..";

#[repr(C)]
#[derive(AsBytes, FromBytes, Copy, Clone)]
pub struct DirectoryEntry {
    /// NUL padded name.
    name: [u8; FILE_NAME_SIZE],
    inode_reference: U16<LittleEndian>,
}

const _: () = assert!(size_of::<DirectoryEntry>() == DIRECTORY_ENTRY_SIZE);

impl DirectoryEntry {
    /// An entry with no name and no inode.
    pub fn free() -> Self {
        Self {
            name: [0; FILE_NAME_SIZE],
            inode_reference: U16::new(UNALLOCATED_INODE),
        }
    }

    pub fn new(name: &str, inode: InodeRef) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_NAME_LENGTH {
            return Err(FSError::NameTooLong(name.to_string()));
        }
        // A NUL would end the stored name early.
        if bytes.contains(&0) {
            return Err(FSError::IllegalName(name.to_string()));
        }
        let mut entry = Self::free();
        entry.name[..bytes.len()].copy_from_slice(bytes);
        entry.inode_reference = U16::new(inode);
        Ok(entry)
    }

    /// Name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FILE_NAME_SIZE);
        &self.name[..len]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// The inode this entry names, `None` for a free slot.
    pub fn inode(&self) -> Option<InodeRef> {
        match self.inode_reference.get() {
            UNALLOCATED_INODE => None,
            inode => Some(inode),
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode().is_none()
    }
}

impl std::fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryEntry")
            .field("name", &self.name())
            .field("inode", &self.inode())
            .finish()
    }
}

impl PartialEq for DirectoryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

#[repr(C)]
#[derive(AsBytes, FromBytes, Copy, Clone, Debug, PartialEq)]
pub struct DirectoryBlock {
    entries: [DirectoryEntry; DIRECTORY_ENTRIES_PER_BLOCK],
}

const _: () = assert!(size_of::<DirectoryBlock>() == BLOCK_SIZE);

impl DirectoryBlock {
    /// A block whose every slot is free.
    pub fn empty() -> Self {
        Self {
            entries: [DirectoryEntry::free(); DIRECTORY_ENTRIES_PER_BLOCK],
        }
    }

    /// A new directory holding only `.` -> `this` and `..` -> `parent`.
    pub fn new(this: InodeRef, parent: InodeRef) -> Self {
        let mut block = Self::empty();
        block.entries[0] = fixed_entry(SELF_NAME, this);
        block.entries[1] = fixed_entry(PARENT_NAME, parent);
        block
    }

    pub fn parse(buf: &Block) -> Result<Self> {
        Self::read_from(&buf[..])
            .ok_or_else(|| FSError::Corrupt("directory block layout".to_string()))
    }

    pub fn serialize(&self) -> Block {
        let mut block = [0; BLOCK_SIZE];
        block.copy_from_slice(self.as_bytes());
        block
    }

    pub fn entry(&self, slot: usize) -> &DirectoryEntry {
        &self.entries[slot]
    }

    /// Allocated entries in storage order, paired with their slot.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &DirectoryEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| !e.is_free())
    }

    /// Number of allocated entries, `.` and `..` included.
    pub fn populated(&self) -> usize {
        self.entries().count()
    }

    /// Looks `name` up by exact byte comparison. Slots are scanned in storage
    /// order and the first match wins.
    pub fn find(&self, name: &[u8]) -> Option<(usize, InodeRef)> {
        self.entries()
            .find(|(_, e)| e.name_bytes() == name)
            .and_then(|(slot, e)| e.inode().map(|inode| (slot, inode)))
    }

    /// Places a new entry in the first free slot, returning the slot used.
    pub fn insert(&mut self, name: &str, inode: InodeRef) -> Result<usize> {
        let entry = DirectoryEntry::new(name, inode)?;
        let slot = self
            .entries
            .iter()
            .position(DirectoryEntry::is_free)
            .ok_or(FSError::DirectoryFull)?;
        self.entries[slot] = entry;
        Ok(slot)
    }

    /// Frees the entry called `name`, returning the inode it referred to. The
    /// `.` and `..` slots are never freed.
    pub fn remove(&mut self, name: &[u8]) -> Option<InodeRef> {
        let (slot, inode) = self.find(name)?;
        if slot < 2 {
            return None;
        }
        self.entries[slot] = DirectoryEntry::free();
        Some(inode)
    }
}

fn fixed_entry(name: &str, inode: InodeRef) -> DirectoryEntry {
    let mut entry = DirectoryEntry::free();
    entry.name[..name.len()].copy_from_slice(name.as_bytes());
    entry.inode_reference = U16::new(inode);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_directory_has_self_and_parent_entries() {
        let block = DirectoryBlock::new(4, 1);

        assert_eq!(block.entry(0).name(), ".");
        assert_eq!(block.entry(0).inode(), Some(4));
        assert_eq!(block.entry(1).name(), "..");
        assert_eq!(block.entry(1).inode(), Some(1));
        assert_eq!(block.populated(), 2);
        assert!((2..DIRECTORY_ENTRIES_PER_BLOCK).all(|slot| block.entry(slot).is_free()));
    }

    #[test]
    fn root_block_matches_formatted_bytes() {
        let buf = DirectoryBlock::new(0, 0).serialize();

        assert_eq!(&buf[0..2], b".\0");
        assert_eq!(&buf[14..16], &[0, 0]);
        assert_eq!(&buf[16..19], b"..\0");
        assert_eq!(&buf[30..32], &[0, 0]);
        // Free slot: empty name, unallocated reference.
        assert_eq!(buf[32], 0);
        assert_eq!(&buf[46..48], &[0xFF, 0xFF]);
    }

    #[test]
    fn insert_uses_first_free_slot() {
        let mut block = DirectoryBlock::new(0, 0);
        assert_eq!(block.insert("a", 1).unwrap(), 2);
        assert_eq!(block.insert("b", 2).unwrap(), 3);

        block.remove(b"a").unwrap();
        assert_eq!(block.insert("c", 3).unwrap(), 2);
        assert_eq!(block.find(b"c"), Some((2, 3)));
    }

    #[test]
    fn insert_into_full_block_fails() {
        let mut block = DirectoryBlock::new(0, 0);
        for i in 2..DIRECTORY_ENTRIES_PER_BLOCK {
            block.insert(&format!("d{}", i), i as InodeRef).unwrap();
        }
        assert_eq!(block.populated(), DIRECTORY_ENTRIES_PER_BLOCK);
        match block.insert("overflow", 40) {
            Err(FSError::DirectoryFull) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn names_longer_than_buffer_are_rejected() {
        assert!(DirectoryEntry::new("abcdefghijklm", 1).is_ok());
        match DirectoryEntry::new("abcdefghijklmn", 1) {
            Err(FSError::NameTooLong(name)) => assert_eq!(name, "abcdefghijklmn"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn names_with_nul_are_rejected() {
        for name in &["a\0b", "\0z", "x\0"] {
            match DirectoryEntry::new(name, 1) {
                Err(FSError::IllegalName(_)) => (),
                other => panic!("unexpected result for {:?}: {:?}", name, other),
            }
        }
        let mut block = DirectoryBlock::new(0, 0);
        assert!(block.insert("a\0b", 2).is_err());
        assert_eq!(block.populated(), 2);
    }

    #[test]
    fn lookup_is_exact() {
        let mut block = DirectoryBlock::new(0, 0);
        block.insert("abc", 5).unwrap();

        assert_eq!(block.find(b"abc"), Some((2, 5)));
        assert_eq!(block.find(b"ab"), None);
        assert_eq!(block.find(b"abcd"), None);
        assert_eq!(block.find(b"."), Some((0, 0)));
    }

    #[test]
    fn fixed_entries_cannot_be_removed() {
        let mut block = DirectoryBlock::new(3, 0);
        assert_eq!(block.remove(b"."), None);
        assert_eq!(block.remove(b".."), None);
        assert_eq!(block.populated(), 2);
    }

    #[test]
    fn parse_restores_serialized_entries() {
        let mut block = DirectoryBlock::new(2, 0);
        block.insert("docs", 6).unwrap();

        let parsed = DirectoryBlock::parse(&block.serialize()).unwrap();

        assert_eq!(parsed, block);
        assert_eq!(parsed.find(b"docs"), Some((2, 6)));
    }
}
