use crate::io::{BlockNumber, BlockStorage};
use crate::layout::BLOCK_SIZE;
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

pub struct FileBlockEmulator {
    /// The file must be a fixed-size file some exact multiple of the size of a block.
    fd: File,
    /// The total number of blocks available in the file store.
    block_count: usize,
}

/// Emulates block disk storage in userspace using a file as block storage.
/// Each virtual disk image is one such file.
impl FileBlockEmulator {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, blocknr: BlockNumber) -> std::io::Result<()> {
        if blocknr >= self.block_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileBlockEmulator {
    fn open_disk<P: AsRef<Path>>(dest: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Return error if the file does not exist rather than create one.
        let file = OpenOptions::new().read(true).write(true).open(dest)?;
        let len = file.metadata()?.len();
        if len < (nblocks * BLOCK_SIZE) as u64 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "disk image is smaller than the requested block count",
            ));
        }

        Ok(FileBlockEmulator {
            fd: file,
            block_count: nblocks,
        })
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        if buf.len() < BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read block",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;
        self.fd.read_exact(&mut buf[..BLOCK_SIZE])
    }

    /// This method truncates writes that exceed the total block size.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        self.fd
            .seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;

        let max = BLOCK_SIZE.min(buf.len());
        self.fd.write_all(&buf[0..max])
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }
}

pub struct FileBlockEmulatorBuilder {
    fd: File,
    block_count: usize,
    clear_medium: bool,
}

impl From<File> for FileBlockEmulatorBuilder {
    fn from(fd: File) -> Self {
        FileBlockEmulatorBuilder {
            fd,
            block_count: crate::layout::N_BLOCKS,
            clear_medium: true,
        }
    }
}

impl FileBlockEmulatorBuilder {
    /// Sets the number of desired blocks in the block store device.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.block_count = blocks;
        self
    }

    /// Whether `build` zeroes the medium. Defaults to true; disable it to reuse
    /// an image that already holds a file system.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear_medium = clear;
        self
    }

    /// This builder assumes ownership of the file descriptor used and, unless
    /// told otherwise, does destructive things to prepare the file for use.
    pub fn build(mut self) -> std::io::Result<FileBlockEmulator> {
        if self.block_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block count must be non-zero",
            ));
        }
        if self.clear_medium {
            self.zero_blocks()?;
        }
        Ok(FileBlockEmulator {
            fd: self.fd,
            block_count: self.block_count,
        })
    }

    fn zero_blocks(&mut self) -> std::io::Result<()> {
        self.fd.set_len(0)?;
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Zero out the "disk" block, buffering each write to prevent excessive writes.
        let zeroes = [0x00; BLOCK_SIZE];
        for _ in 0..self.block_count {
            bfd.write_all(&zeroes)?;
        }
        bfd.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_emulator_allocates_correct_num_bytes() {
        let fs_block = tempfile::tempfile().unwrap();
        let mut disk_emu = FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(4)
            .build()
            .expect("failed to allocate file block");
        disk_emu.sync_disk().unwrap();
        assert_eq!(
            disk_emu.into_file().metadata().unwrap().len(),
            4 * BLOCK_SIZE as u64
        );
    }

    #[test]
    fn can_read_and_write_blocks() {
        let fs_block = tempfile::tempfile().unwrap();
        let mut disk_emu = FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(4)
            .build()
            .expect("failed to allocate file block");

        // Allocate a block with a non-zero character.
        let block = vec![0x55; BLOCK_SIZE];
        disk_emu.write_block(2, &block).unwrap();

        let mut read_block = vec![0x00; BLOCK_SIZE];
        // Read a different block.
        disk_emu.read_block(3, &mut read_block).unwrap();
        assert_eq!(read_block, vec![0x00; BLOCK_SIZE]);

        // Read the block with data.
        let mut filled_block = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(2, &mut filled_block).unwrap();
        assert_eq!(filled_block, vec![0x55; BLOCK_SIZE]);
    }

    #[test]
    fn read_block_beyond_range_returns_error() {
        let fs_block = tempfile::tempfile().unwrap();
        let mut disk_emu = FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(1)
            .build()
            .expect("failed to allocate file block");

        let block = vec![0x55; BLOCK_SIZE];
        let err = disk_emu.write_block(1, &block).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let mut buf = vec![0; BLOCK_SIZE];
        assert!(disk_emu.read_block(1, &mut buf).is_err());
    }

    #[test]
    fn reading_into_short_buffer_returns_error() {
        let fs_block = tempfile::tempfile().unwrap();
        let mut disk_emu = FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(1)
            .build()
            .unwrap();

        let mut buf = vec![0; BLOCK_SIZE / 2];
        assert!(disk_emu.read_block(0, &mut buf).is_err());
    }

    #[test]
    fn writing_to_block_with_block_size_lt_max_succeeds() {
        let fs_block = tempfile::tempfile().unwrap();
        let mut disk_emu = FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(1)
            .build()
            .expect("failed to allocate file block");

        // Fill half the block with meaningful data.
        let block = vec![0x55; BLOCK_SIZE / 2];
        disk_emu
            .write_block(0, &block)
            .expect("failed to write block");

        let mut read_block = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(0, &mut read_block).unwrap();
        assert_eq!(&read_block[..BLOCK_SIZE / 2], &block[..]);
        assert!(read_block[BLOCK_SIZE / 2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn open_disk_reuses_existing_image() {
        let disk = tempfile::NamedTempFile::new().unwrap();
        let mut emu = FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            .build()
            .unwrap();
        emu.write_block(1, &[0xAA; BLOCK_SIZE]).unwrap();
        emu.sync_disk().unwrap();
        drop(emu);

        let mut reopened = FileBlockEmulator::open_disk(disk.path(), 2).unwrap();
        let mut buf = [0; BLOCK_SIZE];
        reopened.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, [0xAA; BLOCK_SIZE]);
    }

    #[test]
    fn open_disk_rejects_short_image() {
        let disk = tempfile::NamedTempFile::new().unwrap();
        FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            .build()
            .unwrap();

        let err = FileBlockEmulator::open_disk(disk.path(), 4).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn builder_without_clearing_preserves_contents() {
        let disk = tempfile::NamedTempFile::new().unwrap();
        let mut emu = FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            .build()
            .unwrap();
        emu.write_block(0, &[0x11; BLOCK_SIZE]).unwrap();
        emu.sync_disk().unwrap();

        let mut emu = FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            .clear_medium(false)
            .build()
            .unwrap();
        let mut buf = [0; BLOCK_SIZE];
        emu.read_block(0, &mut buf).unwrap();
        assert_eq!(buf, [0x11; BLOCK_SIZE]);
    }
}
