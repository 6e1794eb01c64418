use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use crate::io::block::{BlockNumber, BlockStorage};
use crate::BLOCK_SIZE;

/// A flat file treated as an array of 4k blocks. Block `n` occupies bytes
/// `n * BLOCK_SIZE .. (n + 1) * BLOCK_SIZE` of the file.
///
/// The file is not sized up front; it grows as blocks are written. Reading a
/// block that was never written past the end of the file reports an I/O
/// error (short read) rather than fabricating zeroes.
pub struct ImageFile {
    fd: File,
}

impl ImageFile {
    /// Opens (creating if absent) the image file at `path` with read/write
    /// access. Passing `truncate` discards any existing content, leaving an
    /// empty image that still needs formatting.
    pub fn open<P: AsRef<Path>>(path: P, truncate: bool) -> std::io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)?;
        Ok(ImageFile { fd })
    }

    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }
}

impl From<File> for ImageFile {
    fn from(fd: File) -> Self {
        ImageFile { fd }
    }
}

impl BlockStorage for ImageFile {
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        if buf.len() < BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read block",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;
        // read_exact turns a short read into UnexpectedEof.
        self.fd.read_exact(&mut buf[..BLOCK_SIZE])
    }

    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        if buf.len() < BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain a full block to write",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;
        self.fd.write_all(&buf[..BLOCK_SIZE])
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }
}
