//! Path tokenization and resolution.

use log::{debug, warn};

use crate::error::{FSError, Result};
use crate::fs::DirFS;
use crate::io::BlockStorage;
use crate::layout::{InodeRef, MAX_PATH_LENGTH, ROOT_INODE};

pub const SEPARATOR: char = '/';

/// Components of `path` in order. Repeated, leading and trailing separators
/// produce no empty components.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|c| !c.is_empty())
}

pub fn final_component(path: &str) -> Option<&str> {
    components(path).last()
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// True for `/` and anything else made only of separators.
pub fn is_root(path: &str) -> bool {
    is_absolute(path) && components(path).next().is_none()
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
    /// Every component exists.
    Found,
    /// Every component but the last exists.
    NotFound,
}

/// Outcome of walking a path.
///
/// When the target is `Found`, `child` is the target and `parent` the directory
/// whose entry names it. When it is `NotFound`, `child` is the directory that
/// was searched for the missing last component and `parent` that directory's
/// own parent.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Resolution {
    pub parent: InodeRef,
    pub child: InodeRef,
    pub status: Status,
}

impl<T: BlockStorage> DirFS<T> {
    /// Walks `target` from the working directory `cwd`, or from the root when
    /// `target` is absolute. The working directory is always validated first.
    ///
    /// # Errors
    ///
    /// `InvalidCwd` when `cwd` does not name a directory, `InvalidPath` when the
    /// target is the root, empty, or missing an intermediate component.
    pub fn resolve(&mut self, cwd: &str, target: &str) -> Result<Resolution> {
        if target.len() > MAX_PATH_LENGTH || is_root(target) {
            return Err(FSError::InvalidPath(target.to_string()));
        }
        let tokens: Vec<&str> = components(target).collect();
        if tokens.is_empty() {
            return Err(FSError::InvalidPath(target.to_string()));
        }

        let (mut parent, mut child) = self.walk_cwd(cwd)?;
        if is_absolute(target) {
            parent = ROOT_INODE;
            child = ROOT_INODE;
        }

        let last = tokens.len() - 1;
        for (i, token) in tokens.into_iter().enumerate() {
            match self.lookup(child, token, target)? {
                Some(next) => {
                    parent = child;
                    child = next;
                }
                None if i == last => {
                    debug!("{} not found in inode {}", token, child);
                    return Ok(Resolution {
                        parent,
                        child,
                        status: Status::NotFound,
                    });
                }
                None => {
                    warn!("Improper path name {}", target);
                    return Err(FSError::InvalidPath(target.to_string()));
                }
            }
        }

        Ok(Resolution {
            parent,
            child,
            status: Status::Found,
        })
    }

    /// Resolves the working directory to its (parent, self) pair. Any miss means
    /// the caller's context is untrustworthy.
    fn walk_cwd(&mut self, cwd: &str) -> Result<(InodeRef, InodeRef)> {
        if cwd.len() > MAX_PATH_LENGTH {
            return Err(FSError::InvalidCwd(cwd.to_string()));
        }

        let (mut parent, mut child) = (ROOT_INODE, ROOT_INODE);
        for token in components(cwd) {
            match self.lookup(child, token, cwd) {
                Ok(Some(next)) => {
                    parent = child;
                    child = next;
                }
                Ok(None) | Err(FSError::NotADirectory(_)) => {
                    warn!("Invalid cwd {}", cwd);
                    return Err(FSError::InvalidCwd(cwd.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        let cwd_inode = self.read_inode(child)?;
        if !cwd_inode.is_directory() {
            return Err(FSError::InvalidCwd(cwd.to_string()));
        }
        Ok((parent, child))
    }

    /// Looks `name` up in directory `dir`. `path` is only used for error reporting.
    fn lookup(&mut self, dir: InodeRef, name: &str, path: &str) -> Result<Option<InodeRef>> {
        let inode = self.read_inode(dir)?;
        if !inode.is_directory() {
            return Err(FSError::NotADirectory(path.to_string()));
        }
        let block = self.read_directory(inode.directory_block())?;
        Ok(block.find(name.as_bytes()).map(|(_, found)| found))
    }
}
