//! A small inode based file system living in a single fixed-size disk image.
//!
//! The disk is 128 blocks of 256 bytes. Block 0 holds the inode and block
//! allocation bitmaps, blocks 1 through 8 hold the inode table and block 9 the
//! root directory. Every directory occupies exactly one block of 16 entries.
//!
//! ```no_run
//! use dirfs::io::MemoryDisk;
//! use dirfs::{layout, DirFS};
//!
//! let mut fs = DirFS::format(MemoryDisk::new(layout::N_BLOCKS)).unwrap();
//! fs.mkdir("/", "/projects").unwrap();
//! for line in fs.list("/", "/").unwrap() {
//!     println!("{}", line);
//! }
//! ```
pub mod alloc;
pub mod check;
pub mod config;
pub mod dir;
mod error;
mod fs;
pub mod io;
pub mod layout;
pub mod master;
pub mod node;
pub mod path;

pub use crate::check::Inconsistency;
pub use crate::error::{FSError, Result};
pub use crate::fs::DirFS;
pub use crate::path::{Resolution, Status};
