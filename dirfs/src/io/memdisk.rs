use crate::io::{BlockNumber, BlockStorage};
use crate::layout::BLOCK_SIZE;
use std::io::ErrorKind;
use std::path::Path;

/// A disk held entirely in memory. Useful for tests and for inspecting an image
/// without touching the original file.
pub struct MemoryDisk {
    bytes: Vec<u8>,
    block_count: usize,
    /// Remaining writes before the disk starts failing. `None` never fails.
    writes_left: Option<usize>,
}

impl MemoryDisk {
    /// Creates a zeroed disk of `nblocks` blocks.
    pub fn new(nblocks: usize) -> Self {
        Self {
            bytes: vec![0; nblocks * BLOCK_SIZE],
            block_count: nblocks,
            writes_left: None,
        }
    }

    /// Makes every write after the next `n` successful ones fail with an IO error.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.writes_left = Some(n);
    }

    /// Lifts a limit set with `fail_writes_after`.
    pub fn heal(&mut self) {
        self.writes_left = None;
    }

    /// The whole image, block 0 first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, blocknr: BlockNumber) -> std::io::Result<std::ops::Range<usize>> {
        if blocknr >= self.block_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block out of range",
            ));
        }
        let start = blocknr * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockStorage for MemoryDisk {
    /// Loads a copy of the image at `path`. Writes never reach the file.
    fn open_disk<P: AsRef<Path>>(path: P, nblocks: usize) -> std::io::Result<Self> {
        let mut bytes = std::fs::read(path)?;
        if bytes.len() < nblocks * BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "disk image is smaller than the requested block count",
            ));
        }
        bytes.truncate(nblocks * BLOCK_SIZE);
        Ok(Self {
            bytes,
            block_count: nblocks,
            writes_left: None,
        })
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        let range = self.range(blocknr)?;
        if buf.len() < BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read block",
            ));
        }
        buf[..BLOCK_SIZE].copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        let range = self.range(blocknr)?;
        match self.writes_left {
            Some(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::Other,
                    "injected write failure",
                ))
            }
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        let max = BLOCK_SIZE.min(buf.len());
        self.bytes[range.start..range.start + max].copy_from_slice(&buf[..max]);
        Ok(())
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
