use thiserror::Error;

#[derive(Error, Debug)]
pub enum FSError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid working directory: {0}")]
    InvalidCwd(String),
    #[error("name exists: {0}")]
    NameExists(String),
    #[error("found no file at path: {0}")]
    NameNotFound(String),
    #[error("illegal name: {0}")]
    IllegalName(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("directory is full")]
    DirectoryFull,
    #[error("no free inodes")]
    NoFreeInode,
    #[error("no free blocks")]
    NoFreeBlock,
    #[error("name too long: {0}")]
    NameTooLong(String),
    #[error("disk is not formatted")]
    Unformatted,
    #[error("corrupt file system: {0}")]
    Corrupt(String),
    #[error("block storage failure")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FSError>;
