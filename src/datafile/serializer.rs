use crate::errors::*;
use crate::utils::crc32;

use super::{DataFileManager, DataReader, DataWriter};

/// Types that know how to store themselves in a data file record.
pub trait DataSerializer {
    fn serialize(&self, writer: &mut DataWriter<'_>) -> Result<()>;
    fn deserialize(&mut self, reader: &mut DataReader<'_>) -> Result<()>;
}

impl DataFileManager {
    /// Writes `value` into the entry addressed by `crc32(path)`. Returns true if the
    /// entry existed already.
    pub fn store<T>(&mut self, path: &str, value: &T) -> Result<bool>
    where
        T: DataSerializer + ?Sized,
    {
        let (mut writer, existed) = self.get_writer(crc32(path))?;
        value.serialize(&mut writer)?;
        writer.close()?;
        Ok(existed)
    }

    /// Reads the entry addressed by `crc32(path)` into `value`. Returns false, leaving
    /// `value` untouched, if there is no such entry.
    pub fn restore<T>(&mut self, path: &str, value: &mut T) -> Result<bool>
    where
        T: DataSerializer + ?Sized,
    {
        match self.try_get_reader(crc32(path)) {
            Ok(mut reader) => {
                value.deserialize(&mut reader)?;
                Ok(true)
            }
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
