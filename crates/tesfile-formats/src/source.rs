//! Random-access byte source shared by the plugin and archive readers
//!
//! Every read is addressed by an absolute offset and bounds-checked against
//! the source length up front, so a short file is reported as a truncation at
//! a known offset rather than as a bare end-of-file from the OS.

use binrw::BinRead;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Byte source result type
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while reading from a byte source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Fewer bytes remain than the read requires
    #[error("Truncated read at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Absolute offset of the read
        offset: u64,
        /// Number of bytes requested
        needed: u64,
        /// Number of bytes left in the source from `offset`
        available: u64,
    },

    /// No NUL terminator before the end of the source
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString {
        /// Absolute offset where the string starts
        offset: u64,
    },

    /// Binary read error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusively owned random-access binary stream
///
/// The handle is released when the source is dropped.
#[derive(Debug)]
pub struct ByteSource<R = BufReader<File>> {
    reader: R,
    len: u64,
}

impl ByteSource<BufReader<File>> {
    /// Open a file on disk
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let source = Self::new(BufReader::new(file))?;
        debug!("Opened {} ({} bytes)", path.display(), source.len);
        Ok(source)
    }
}

impl ByteSource<Cursor<Vec<u8>>> {
    /// Wrap an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            reader: Cursor::new(data),
            len,
        }
    }
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap a seekable reader, measuring its length
    pub fn new(mut reader: R) -> SourceResult<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, len })
    }

    /// Total length in bytes
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source holds no bytes
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes available from `offset` to the end
    pub const fn remaining(&self, offset: u64) -> u64 {
        self.len.saturating_sub(offset)
    }

    /// Read exactly `length` bytes starting at `offset`
    pub fn read_at(&mut self, offset: u64, length: usize) -> SourceResult<Vec<u8>> {
        self.check_bounds(offset, length as u64)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read up to `length` bytes starting at `offset`, stopping early at the end
    pub fn read_up_to(&mut self, offset: u64, length: usize) -> SourceResult<Vec<u8>> {
        let available = usize::try_from(self.remaining(offset)).unwrap_or(usize::MAX);
        self.read_at(offset.min(self.len), length.min(available))
    }

    /// Read a fixed-size array at `offset`
    pub fn read_array<const N: usize>(&mut self, offset: u64) -> SourceResult<[u8; N]> {
        self.check_bounds(offset, N as u64)?;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a single byte
    pub fn read_u8(&mut self, offset: u64) -> SourceResult<u8> {
        let [b] = self.read_array::<1>(offset)?;
        Ok(b)
    }

    /// Read a little-endian u32
    pub fn read_u32_le(&mut self, offset: u64) -> SourceResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>(offset)?))
    }

    /// Decode a little-endian binrw structure occupying `size` bytes at `offset`
    ///
    /// The window is bounds-checked and buffered before decoding so that a
    /// structure cut short by the end of the source reports its own offset.
    pub fn decode_le<T>(&mut self, offset: u64, size: usize, args: T::Args<'_>) -> SourceResult<T>
    where
        T: BinRead,
    {
        let window = self.read_at(offset, size)?;
        let mut cursor = Cursor::new(window);
        Ok(T::read_options(&mut cursor, binrw::Endian::Little, args)?)
    }

    /// Read a NUL-terminated string starting at `offset`
    ///
    /// The terminator is consumed but not returned. Bytes that are not valid
    /// UTF-8 are replaced.
    pub fn read_cstring(&mut self, offset: u64) -> SourceResult<String> {
        let bytes = self.read_cstring_bytes(offset)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the raw bytes of a NUL-terminated string starting at `offset`
    pub fn read_cstring_bytes(&mut self, offset: u64) -> SourceResult<Vec<u8>> {
        const CHUNK: usize = 64;

        let mut bytes = Vec::new();
        let mut pos = offset;
        loop {
            if pos >= self.len {
                return Err(SourceError::UnterminatedString { offset });
            }
            let chunk = self.read_up_to(pos, CHUNK)?;
            if let Some(nul) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                return Ok(bytes);
            }
            bytes.extend_from_slice(&chunk);
            pos += chunk.len() as u64;
        }
    }

    /// Release the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn check_bounds(&self, offset: u64, needed: u64) -> SourceResult<()> {
        let available = self.remaining(offset);
        if needed > available {
            return Err(SourceError::Truncated {
                offset,
                needed,
                available,
            });
        }
        Ok(())
    }
}
