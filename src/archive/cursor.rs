use crate::error::Result;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Seek/tell/read wrapper over one exclusively owned archive handle.
///
/// Every read is exact: a short read surfaces as an I/O error rather than a
/// partially filled buffer.
#[derive(Debug)]
pub struct ByteCursor<R = File> {
    inner: R,
}

impl<R: Read + Seek> ByteCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Total length of the underlying stream
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Read `len` bytes starting at `pos`
    pub fn read_at(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.seek(pos)?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek + Write> ByteCursor<R> {
    /// Write `data` starting at `pos`
    pub fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        self.seek(pos)?;
        self.inner.write_all(data)?;
        self.inner.flush()?;
        Ok(())
    }
}
