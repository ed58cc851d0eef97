use log::{debug, info, warn};

use crate::alloc::{Category, State};
use crate::dir::{DirectoryBlock, PARENT_NAME, SELF_NAME};
use crate::error::{FSError, Result};
use crate::io::{BlockNumber, BlockStorage};
use crate::layout::{
    empty_block, Block, BlockRef, InodeRef, BLOCK_SIZE, DIRECTORY_ENTRIES_PER_BLOCK,
    INODE_TABLE_START, MASTER_BLOCK, MAX_NAME_LENGTH, N_BLOCKS, ROOT_DIRECTORY_BLOCK,
    ROOT_INODE,
};
use crate::master::MasterBlock;
use crate::node::{self, Inode, InodeType};
use crate::path::{self, Status};

/// A directory tree stored on a 128 block virtual disk.
///
/// The file system keeps no state of its own between calls: every operation
/// reads what it needs from the device and writes its changes straight back.
/// Mutations span several blocks and are not atomic, an error part way through
/// can leave the bitmaps and the tree disagreeing. `check` reports such damage.
pub struct DirFS<T: BlockStorage> {
    dev: T,
}

impl<T: BlockStorage> DirFS<T> {
    /// Formats the device and returns a file system holding only the root directory.
    ///
    /// # Layout
    /// ==========================================================================
    /// | Master Block | Inode Table | Root Directory | Data Region               |
    /// ==========================================================================
    pub fn format(mut dev: T) -> Result<Self> {
        let zeroes = empty_block();
        for blocknr in 0..N_BLOCKS {
            dev.write_block(blocknr, &zeroes)?;
        }

        dev.write_block(
            MASTER_BLOCK as BlockNumber,
            &MasterBlock::formatted().serialize(),
        )?;

        let mut inode_table = empty_block();
        node::write_slot(
            &mut inode_table,
            ROOT_INODE as usize,
            &Inode::directory(ROOT_DIRECTORY_BLOCK),
        );
        dev.write_block(INODE_TABLE_START as BlockNumber, &inode_table)?;

        dev.write_block(
            ROOT_DIRECTORY_BLOCK as BlockNumber,
            &DirectoryBlock::new(ROOT_INODE, ROOT_INODE).serialize(),
        )?;
        dev.sync_disk()?;

        info!("Formatted disk with {} blocks of {} bytes.", N_BLOCKS, BLOCK_SIZE);
        Ok(DirFS { dev })
    }

    /// Opens a device that already holds a formatted file system.
    pub fn open(dev: T) -> Result<Self> {
        let mut fs = DirFS { dev };

        let master = fs.read_master()?;
        let reserved = (0..=ROOT_DIRECTORY_BLOCK as usize)
            .all(|block| master.blocks().get(block) == State::Used);
        if master.inodes().get(ROOT_INODE as usize) == State::Free || !reserved {
            warn!("Master block does not describe a formatted disk.");
            return Err(FSError::Unformatted);
        }

        let root = fs.read_inode(ROOT_INODE).map_err(|err| match err {
            FSError::Corrupt(_) => FSError::Unformatted,
            err => err,
        })?;
        if !root.is_directory() || root.directory_block() != ROOT_DIRECTORY_BLOCK {
            warn!("Root inode is not the root directory.");
            return Err(FSError::Unformatted);
        }
        let root_dir = fs.read_directory(ROOT_DIRECTORY_BLOCK)?;
        if root_dir.entry(0).inode() != Some(ROOT_INODE) {
            return Err(FSError::Unformatted);
        }

        Ok(fs)
    }

    /// Flushes the device and hands it back.
    pub fn into_inner(mut self) -> Result<T> {
        self.dev.sync_disk()?;
        Ok(self.dev)
    }

    fn read_block(&mut self, block: BlockRef) -> Result<Block> {
        let blocknr = block_number(block)?;
        let mut buf = empty_block();
        self.dev.read_block(blocknr, &mut buf)?;
        Ok(buf)
    }

    fn write_block(&mut self, block: BlockRef, buf: &Block) -> Result<()> {
        let blocknr = block_number(block)?;
        self.dev.write_block(blocknr, buf)?;
        Ok(())
    }

    pub fn read_master(&mut self) -> Result<MasterBlock> {
        let buf = self.read_block(MASTER_BLOCK)?;
        MasterBlock::parse(&buf)
    }

    pub fn write_master(&mut self, master: &MasterBlock) -> Result<()> {
        self.write_block(MASTER_BLOCK, &master.serialize())
    }

    pub fn read_inode(&mut self, i: InodeRef) -> Result<Inode> {
        debug!("Fetching inode {}", i);
        let (block, slot) = node::locate(i)?;
        let mut buf = empty_block();
        self.dev.read_block(block, &mut buf)?;
        node::read_slot(&buf, slot)
    }

    /// Replaces inode `i`, rewriting the inode table block that holds it.
    pub fn write_inode(&mut self, i: InodeRef, inode: &Inode) -> Result<()> {
        debug!("Writing inode {}", i);
        let (block, slot) = node::locate(i)?;
        let mut buf = empty_block();
        self.dev.read_block(block, &mut buf)?;
        node::write_slot(&mut buf, slot, inode);
        self.dev.write_block(block, &buf)?;
        Ok(())
    }

    pub fn read_directory(&mut self, block: BlockRef) -> Result<DirectoryBlock> {
        let buf = self.read_block(block)?;
        DirectoryBlock::parse(&buf)
    }

    pub fn write_directory(&mut self, block: BlockRef, dir: &DirectoryBlock) -> Result<()> {
        self.write_block(block, &dir.serialize())
    }

    /// Creates the directory `path`, relative to `cwd` unless absolute, and
    /// returns its inode reference. Every ancestor must already exist.
    pub fn mkdir(&mut self, cwd: &str, path: &str) -> Result<InodeRef> {
        let resolution = self.resolve(cwd, path)?;
        if resolution.status == Status::Found {
            return Err(FSError::NameExists(path.to_string()));
        }

        let name = path::final_component(path)
            .ok_or_else(|| FSError::InvalidPath(path.to_string()))?;
        if name.len() > MAX_NAME_LENGTH {
            return Err(FSError::NameTooLong(name.to_string()));
        }
        if name.contains('\0') {
            return Err(FSError::IllegalName(name.to_string()));
        }

        // On a miss the resolver leaves `child` at the directory that was searched.
        let parent_ref = resolution.child;
        let mut parent = self.read_inode(parent_ref)?;
        if !parent.is_directory() {
            return Err(FSError::NotADirectory(path.to_string()));
        }
        if parent.size as usize >= DIRECTORY_ENTRIES_PER_BLOCK {
            return Err(FSError::DirectoryFull);
        }
        let parent_block = parent.directory_block();
        let mut parent_dir = self.read_directory(parent_block)?;

        let mut master = self.read_master()?;
        let child_ref = master.allocate(Category::Inode)? as InodeRef;
        let child_block = master.allocate(Category::Block)? as BlockRef;
        debug!(
            "Allocating inode {} and block {} for {}",
            child_ref, child_block, name
        );
        let slot = parent_dir.insert(name, child_ref)?;

        self.write_master(&master)?;
        self.write_directory(child_block, &DirectoryBlock::new(child_ref, parent_ref))?;
        self.write_inode(child_ref, &Inode::directory(child_block))?;

        debug!("Linking {} into slot {} of inode {}", name, slot, parent_ref);
        self.write_directory(parent_block, &parent_dir)?;
        parent.size += 1;
        self.write_inode(parent_ref, &parent)?;

        info!("Created directory {} as inode {}.", path, child_ref);
        Ok(child_ref)
    }

    /// Removes the empty directory `path`.
    pub fn rmdir(&mut self, cwd: &str, path: &str) -> Result<()> {
        let name = path::final_component(path)
            .ok_or_else(|| FSError::InvalidPath(path.to_string()))?;
        if name == SELF_NAME || name == PARENT_NAME {
            return Err(FSError::IllegalName(name.to_string()));
        }

        let resolution = self.resolve(cwd, path)?;
        if resolution.status == Status::NotFound {
            return Err(FSError::NameNotFound(path.to_string()));
        }

        let child_ref = resolution.child;
        let child = self.read_inode(child_ref)?;
        if !child.is_directory() {
            return Err(FSError::NotADirectory(path.to_string()));
        }
        if child.size != 2 {
            return Err(FSError::DirectoryNotEmpty(path.to_string()));
        }
        let child_block = child.directory_block();
        block_number(child_block)?;

        let parent_ref = resolution.parent;
        let mut parent = self.read_inode(parent_ref)?;
        let parent_block = parent.directory_block();
        let mut parent_dir = self.read_directory(parent_block)?;
        if parent_dir.remove(name.as_bytes()) != Some(child_ref) {
            return Err(FSError::Corrupt(format!(
                "inode {} has no entry for {}",
                parent_ref, name
            )));
        }
        self.write_directory(parent_block, &parent_dir)?;
        parent.size = parent.size.saturating_sub(1);
        self.write_inode(parent_ref, &parent)?;

        self.write_inode(child_ref, &Inode::free())?;
        self.write_block(child_block, &empty_block())?;

        let mut master = self.read_master()?;
        master.release(Category::Inode, child_ref as usize);
        master.release(Category::Block, child_block as usize);
        self.write_master(&master)?;

        info!("Removed directory {} (inode {}).", path, child_ref);
        Ok(())
    }

    /// Lists `path`. A directory yields its entries sorted by name, with a
    /// trailing `/` on subdirectories. A file yields its own name.
    pub fn list(&mut self, cwd: &str, path: &str) -> Result<Vec<String>> {
        let path = if path.is_empty() { SELF_NAME } else { path };
        let target = if path::is_root(path) {
            ROOT_INODE
        } else {
            let resolution = self.resolve(cwd, path)?;
            if resolution.status == Status::NotFound {
                return Err(FSError::NameNotFound(path.to_string()));
            }
            resolution.child
        };

        let inode = self.read_inode(target)?;
        match inode.kind {
            InodeType::File => Ok(vec![path.to_string()]),
            InodeType::Directory => {
                let dir = self.read_directory(inode.directory_block())?;
                let mut entries: Vec<(Vec<u8>, InodeRef)> = dir
                    .entries()
                    .filter_map(|(_, e)| e.inode().map(|i| (e.name_bytes().to_vec(), i)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));

                let mut listing = Vec::with_capacity(entries.len());
                for (name, i) in entries {
                    let mut line = String::from_utf8_lossy(&name).into_owned();
                    if self.read_inode(i)?.is_directory() {
                        line.push('/');
                    }
                    listing.push(line);
                }
                Ok(listing)
            }
            InodeType::None => Err(FSError::Corrupt(format!(
                "{} names free inode {}",
                path, target
            ))),
        }
    }
}

/// Converts an on-disk block reference to a device block number.
fn block_number(block: BlockRef) -> Result<BlockNumber> {
    if block as usize >= N_BLOCKS {
        return Err(FSError::Corrupt(format!(
            "block reference {} out of range",
            block
        )));
    }
    Ok(block as BlockNumber)
}
