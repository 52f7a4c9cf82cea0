//! Sequential cursors over a single record of the data file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use bincode;
use byteorder::{ByteOrder, NativeEndian};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::*;

use super::{check_block, DataFileManager, BLOCK_HEADER_SIZE};

macro_rules! impl_read_num {
    ($name:ident, $ty:ty, $size:expr, $read:ident) => {
        /// Reads a native endian number, failing with `OutOfBounds` past the block.
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            let mut buf = [0; $size];
            self.read_bytes(&mut buf)?;
            Ok(NativeEndian::$read(&buf))
        }
    };
}

macro_rules! impl_write_num {
    ($name:ident, $ty:ty, $size:expr, $write:ident) => {
        /// Appends a native endian number.
        #[inline]
        pub fn $name(&mut self, v: $ty) {
            let mut buf = [0; $size];
            NativeEndian::$write(&mut buf, v);
            self.buf.extend_from_slice(&buf);
        }
    };
}

/// Reads the payload of one record. The cursor never goes past the block size stored
/// in the record header.
#[derive(Debug)]
pub struct DataReader<'a> {
    file: &'a mut File,
    offset: u64,
    block_size: u64,
    position: u64,
}

impl<'a> DataReader<'a> {
    /// Opens the record at `offset`, whose block must end before `limit`.
    pub(crate) fn new(file: &'a mut File, offset: u64, limit: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0; BLOCK_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let block_size = NativeEndian::read_u64(&header);
        check_block(offset, block_size, limit)?;

        Ok(DataReader {
            file,
            offset,
            block_size,
            position: 0,
        })
    }

    /// Offset of the record (its header) in the data file.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the payload declared by the record header.
    #[inline]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Bytes of payload consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.block_size - self.position
    }

    fn check(&self, requested: u64) -> Result<()> {
        let remaining = self.remaining();
        if requested > remaining {
            Err(Error::OutOfBounds {
                requested,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    /// Fills `buf` entirely. Nothing is consumed if `buf` is longer than the rest
    /// of the block.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check(buf.len() as u64)?;
        self.file.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Reads everything left in the block.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.remaining() as usize];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    /// Moves the cursor `len` bytes forward.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.check(len)?;
        self.file.seek(SeekFrom::Current(len as i64))?;
        self.position += len;
        Ok(())
    }

    impl_read_num!(read_u16, u16, 2, read_u16);
    impl_read_num!(read_u32, u32, 4, read_u32);
    impl_read_num!(read_u64, u64, 8, read_u64);
    impl_read_num!(read_i16, i16, 2, read_i16);
    impl_read_num!(read_i32, i32, 4, read_i32);
    impl_read_num!(read_i64, i64, 8, read_i64);
    impl_read_num!(read_f32, f32, 4, read_f32);
    impl_read_num!(read_f64, f64, 8, read_f64);

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    /// Deserializes a value written with `DataWriter::write_serialized`.
    pub fn read_serialized<T: DeserializeOwned>(&mut self) -> Result<T> {
        Ok(bincode::deserialize_from(self)?)
    }
}

// Short reads at the end of the block, as `std::io::Take` does.
impl<'a> Read for DataReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = ::std::cmp::min(buf.len() as u64, self.remaining()) as usize;
        let len = self.file.read(&mut buf[..len])?;
        self.position += len as u64;
        Ok(len)
    }
}

/// Writes the payload of one record.
///
/// Payload is accumulated in memory and committed by `close`, which also stores the
/// final block size in the record header. A writer dropped without `close` leaves the
/// record untouched (an empty block for newly allocated entries).
pub struct DataWriter<'a> {
    manager: &'a mut DataFileManager,
    entry_id: u32,
    offset: u64,
    existed: bool,
    buf: Vec<u8>,
    closed: bool,
}

impl<'a> DataWriter<'a> {
    pub(crate) fn new(
        manager: &'a mut DataFileManager,
        entry_id: u32,
        offset: u64,
        existed: bool,
    ) -> Self {
        DataWriter {
            manager,
            entry_id,
            offset,
            existed,
            buf: Vec::new(),
            closed: false,
        }
    }

    #[inline]
    pub fn entry_id(&self) -> u32 {
        self.entry_id
    }

    /// Offset of the record this writer was opened on.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns true if the entry was indexed before this writer was requested.
    #[inline]
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Running block size, i.e. the bytes written so far.
    #[inline]
    pub fn block_size(&self) -> u64 {
        self.buf.len() as u64
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Leaves `len` zeroed bytes in the payload.
    #[inline]
    pub fn pad(&mut self, len: u64) {
        let len = self.buf.len() + len as usize;
        self.buf.resize(len, 0);
    }

    impl_write_num!(write_u16, u16, 2, write_u16);
    impl_write_num!(write_u32, u32, 4, write_u32);
    impl_write_num!(write_u64, u64, 8, write_u64);
    impl_write_num!(write_i16, i16, 2, write_i16);
    impl_write_num!(write_i32, i32, 4, write_i32);
    impl_write_num!(write_i64, i64, 8, write_i64);
    impl_write_num!(write_f32, f32, 4, write_f32);
    impl_write_num!(write_f64, f64, 8, write_f64);

    #[inline]
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Serializes `value` with bincode.
    pub fn write_serialized<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        bincode::serialize_into(&mut self.buf, value)?;
        Ok(())
    }

    /// Commits the payload and patches the block size header. Returns the offset the
    /// record finally lives at, which differs from `offset()` if the payload outgrew
    /// its slot and had to be relocated.
    pub fn close(mut self) -> Result<u64> {
        self.closed = true;
        let payload = ::std::mem::replace(&mut self.buf, Vec::new());
        self.manager.commit(self.entry_id, self.offset, &payload)
    }
}

impl<'a> Drop for DataWriter<'a> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "Data writer of entry {:08X} dropped without close, {} bytes discarded.",
                self.entry_id,
                self.buf.len()
            );
        }
    }
}
