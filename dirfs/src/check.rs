//! Read-only consistency checking.
//!
//! Mutations are not atomic, so a failed `mkdir` or `rmdir` can leave the
//! bitmaps, inodes and directory blocks disagreeing. `DirFS::check` walks all
//! three and reports every disagreement it finds without repairing anything.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;

use crate::alloc::State;
use crate::dir::{PARENT_NAME, SELF_NAME};
use crate::error::{FSError, Result};
use crate::fs::DirFS;
use crate::io::BlockStorage;
use crate::layout::{
    BlockRef, InodeRef, N_BLOCKS, N_INODES, ROOT_DIRECTORY_BLOCK, ROOT_INODE,
    UNALLOCATED_BLOCK,
};
use crate::node::Inode;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Inconsistency {
    /// The inode bitmap and the inode's type disagree.
    InodeBitmap { inode: InodeRef, marked: bool },
    /// The block bitmap disagrees with the reserved area and the inode data slots.
    BlockBitmap { block: BlockRef, marked: bool },
    /// The inode record could not be decoded.
    UndecodableInode { inode: InodeRef, reason: String },
    /// A data slot points outside the disk.
    BlockOutOfRange { inode: InodeRef, block: BlockRef },
    /// Two inodes claim the same block.
    SharedBlock { block: BlockRef, inodes: (InodeRef, InodeRef) },
    /// Slot 0 of a directory is not `.` naming the directory itself.
    BadSelfEntry { inode: InodeRef },
    /// Slot 1 of a directory is not `..` naming the directory holding it.
    BadParentEntry { inode: InodeRef, expected: InodeRef },
    /// A directory's size is not its number of populated entries.
    SizeMismatch { inode: InodeRef, size: u16, populated: usize },
    /// A directory entry names an inode that is free or out of range.
    DanglingEntry { directory: InodeRef, name: String, inode: InodeRef },
    /// A directory is linked from more than one place.
    MultiplyLinked { inode: InodeRef },
    /// An allocated inode that no directory entry reaches.
    Unreachable { inode: InodeRef },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Inconsistency::*;
        match self {
            InodeBitmap { inode, marked } => write!(
                f,
                "inode {} is {} in the bitmap but its type disagrees",
                inode,
                if *marked { "used" } else { "free" }
            ),
            BlockBitmap { block, marked } => write!(
                f,
                "block {} is {} in the bitmap but {}",
                block,
                if *marked { "used" } else { "free" },
                if *marked { "nothing references it" } else { "it is in use" }
            ),
            UndecodableInode { inode, reason } => {
                write!(f, "inode {} cannot be decoded: {}", inode, reason)
            }
            BlockOutOfRange { inode, block } => {
                write!(f, "inode {} references block {} beyond the disk", inode, block)
            }
            SharedBlock { block, inodes } => write!(
                f,
                "block {} is claimed by inodes {} and {}",
                block, inodes.0, inodes.1
            ),
            BadSelfEntry { inode } => write!(f, "directory {} has a bad '.' entry", inode),
            BadParentEntry { inode, expected } => write!(
                f,
                "directory {} has a '..' entry not naming {}",
                inode, expected
            ),
            SizeMismatch {
                inode,
                size,
                populated,
            } => write!(
                f,
                "directory {} has size {} but {} entries",
                inode, size, populated
            ),
            DanglingEntry {
                directory,
                name,
                inode,
            } => write!(
                f,
                "entry {} in directory {} names unallocated inode {}",
                name, directory, inode
            ),
            MultiplyLinked { inode } => {
                write!(f, "directory {} is linked more than once", inode)
            }
            Unreachable { inode } => write!(f, "inode {} is not reachable from the root", inode),
        }
    }
}

impl<T: BlockStorage> DirFS<T> {
    /// Reports every place where the bitmaps, inodes and directory blocks
    /// disagree. An empty report means the disk is consistent.
    pub fn check(&mut self) -> Result<Vec<Inconsistency>> {
        let mut report = Vec::new();
        let master = self.read_master()?;

        let mut inodes: Vec<Option<Inode>> = Vec::with_capacity(N_INODES);
        for i in 0..N_INODES as InodeRef {
            match self.read_inode(i) {
                Ok(inode) => inodes.push(Some(inode)),
                Err(FSError::Corrupt(reason)) => {
                    report.push(Inconsistency::UndecodableInode { inode: i, reason });
                    inodes.push(None);
                }
                Err(err) => return Err(err),
            }
        }

        // Bitmap agreement.
        let mut owners: Vec<Option<InodeRef>> = vec![None; N_BLOCKS];
        for block in 0..=ROOT_DIRECTORY_BLOCK {
            owners[block as usize] = Some(ROOT_INODE);
        }
        for (i, slot) in inodes.iter().enumerate() {
            let i = i as InodeRef;
            let allocated = slot.map_or(false, |inode| inode.is_allocated());
            let marked = master.inodes().get(i as usize) == State::Used;
            if slot.is_some() && marked != allocated {
                report.push(Inconsistency::InodeBitmap { inode: i, marked });
            }
            let inode = match slot {
                Some(inode) if inode.is_allocated() => inode,
                _ => continue,
            };
            for &block in inode.data.iter().filter(|&&b| b != UNALLOCATED_BLOCK) {
                if block as usize >= N_BLOCKS {
                    report.push(Inconsistency::BlockOutOfRange { inode: i, block });
                    continue;
                }
                // The root's directory block is part of the reserved area.
                if i == ROOT_INODE && block == ROOT_DIRECTORY_BLOCK {
                    continue;
                }
                match owners[block as usize] {
                    Some(other) => report.push(Inconsistency::SharedBlock {
                        block,
                        inodes: (other, i),
                    }),
                    None => owners[block as usize] = Some(i),
                }
            }
        }
        for (block, owner) in owners.iter().enumerate() {
            let marked = master.blocks().get(block) == State::Used;
            if marked != owner.is_some() {
                report.push(Inconsistency::BlockBitmap {
                    block: block as BlockRef,
                    marked,
                });
            }
        }

        // Tree walk from the root.
        let mut reached = BTreeSet::new();
        reached.insert(ROOT_INODE);
        let mut pending = vec![(ROOT_INODE, ROOT_INODE)];
        while let Some((dir_ref, parent_ref)) = pending.pop() {
            let dir_inode = match inodes[dir_ref as usize] {
                Some(inode) => inode,
                None => continue,
            };
            let block = dir_inode.directory_block();
            if block as usize >= N_BLOCKS {
                continue;
            }
            debug!("Checking directory {} in block {}", dir_ref, block);
            let dir = self.read_directory(block)?;

            let this = dir.entry(0);
            if this.name() != SELF_NAME || this.inode() != Some(dir_ref) {
                report.push(Inconsistency::BadSelfEntry { inode: dir_ref });
            }
            let up = dir.entry(1);
            if up.name() != PARENT_NAME || up.inode() != Some(parent_ref) {
                report.push(Inconsistency::BadParentEntry {
                    inode: dir_ref,
                    expected: parent_ref,
                });
            }
            if dir_inode.size as usize != dir.populated() {
                report.push(Inconsistency::SizeMismatch {
                    inode: dir_ref,
                    size: dir_inode.size,
                    populated: dir.populated(),
                });
            }

            for (_, entry) in dir.entries().filter(|(slot, _)| *slot >= 2) {
                let child_ref = match entry.inode() {
                    Some(child) => child,
                    None => continue,
                };
                let child = inodes
                    .get(child_ref as usize)
                    .copied()
                    .flatten()
                    .filter(Inode::is_allocated);
                let child = match child {
                    Some(child) => child,
                    None => {
                        report.push(Inconsistency::DanglingEntry {
                            directory: dir_ref,
                            name: entry.name().into_owned(),
                            inode: child_ref,
                        });
                        continue;
                    }
                };
                if !reached.insert(child_ref) {
                    report.push(Inconsistency::MultiplyLinked { inode: child_ref });
                    continue;
                }
                if child.is_directory() {
                    pending.push((child_ref, dir_ref));
                }
            }
        }

        for (i, slot) in inodes.iter().enumerate() {
            let i = i as InodeRef;
            if let Some(inode) = slot {
                if inode.is_allocated() && !reached.contains(&i) {
                    report.push(Inconsistency::Unreachable { inode: i });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryDisk;
    use crate::alloc::Category;
    use crate::master::MasterBlock;

    fn create_test_fs() -> DirFS<MemoryDisk> {
        DirFS::format(MemoryDisk::new(N_BLOCKS)).unwrap()
    }

    #[test]
    fn fresh_disk_is_consistent() {
        let mut fs = create_test_fs();
        let report = fs.check().unwrap();
        assert!(report.is_empty(), "{:?}", report);
    }

    #[test]
    fn populated_tree_is_consistent() {
        let mut fs = create_test_fs();
        fs.mkdir("/", "a").unwrap();
        fs.mkdir("/", "a/b").unwrap();
        fs.mkdir("/a", "c").unwrap();
        fs.mkdir("/", "d").unwrap();
        fs.rmdir("/", "d").unwrap();

        let report = fs.check().unwrap();
        assert!(report.is_empty(), "{:?}", report);
    }

    #[test]
    fn leaked_allocation_is_reported() {
        let mut fs = create_test_fs();
        let mut master = fs.read_master().unwrap();
        let inode = master.allocate(Category::Inode).unwrap();
        let block = master.allocate(Category::Block).unwrap();
        fs.write_master(&master).unwrap();

        let report = fs.check().unwrap();
        assert!(report.contains(&Inconsistency::InodeBitmap {
            inode: inode as InodeRef,
            marked: true
        }));
        assert!(report.contains(&Inconsistency::BlockBitmap {
            block: block as BlockRef,
            marked: true
        }));
    }

    #[test]
    fn cleared_bitmap_is_reported() {
        let mut fs = create_test_fs();
        let a = fs.mkdir("/", "a").unwrap();
        fs.write_master(&MasterBlock::formatted()).unwrap();

        let report = fs.check().unwrap();
        assert!(report.contains(&Inconsistency::InodeBitmap {
            inode: a,
            marked: false
        }));
        assert!(report.contains(&Inconsistency::BlockBitmap {
            block: ROOT_DIRECTORY_BLOCK + 1,
            marked: false
        }));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let mut fs = create_test_fs();
        let mut root = fs.read_inode(ROOT_INODE).unwrap();
        root.size = 5;
        fs.write_inode(ROOT_INODE, &root).unwrap();

        assert_eq!(
            fs.check().unwrap(),
            vec![Inconsistency::SizeMismatch {
                inode: ROOT_INODE,
                size: 5,
                populated: 2
            }]
        );
    }

    #[test]
    fn orphaned_directory_is_unreachable() {
        let mut fs = create_test_fs();
        let a = fs.mkdir("/", "a").unwrap();
        let mut root_dir = fs.read_directory(ROOT_DIRECTORY_BLOCK).unwrap();
        root_dir.remove(b"a").unwrap();
        fs.write_directory(ROOT_DIRECTORY_BLOCK, &root_dir).unwrap();

        let report = fs.check().unwrap();
        assert!(report.contains(&Inconsistency::Unreachable { inode: a }));
    }

    #[test]
    fn display_is_human_readable() {
        let line = Inconsistency::DanglingEntry {
            directory: 0,
            name: "a".to_string(),
            inode: 4,
        }
        .to_string();
        assert_eq!(line, "entry a in directory 0 names unallocated inode 4");
    }
}
