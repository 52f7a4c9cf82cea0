//! Packed binary storage of resource payloads.
//!
//! A project directory holds two binary files:
//!
//! * the data file (`project.dat`), a sequence of variable-length records. Each record
//! starts with an 8 bytes block size header followed by that many payload bytes;
//! * the index file (`project.idx`), which maps a 32-bit entry id to the offset of its
//! record. Record offsets are never self-describing, the index is the only way to
//! find them.
//!
//! Both use native byte order. Entry ids are usually the `crc32` of the local path of
//! the resource owning the payload.
//!
//! # Allocation
//!
//! New entries are appended at the end of the data file. Rewriting an existing entry
//! happens in place as long as the new payload fits in its slot, where the slot of a
//! record extends up to the start of the next record (or is unbounded for the last
//! one). A payload that outgrows its slot is relocated to the end of the file and the
//! old slot becomes dead space, which `compact` reclaims.
//!
//! The manager is meant to be used from a single thread. The files are opened with
//! read/write access and no locking.

pub mod cursor;
pub mod index;
pub mod serializer;

pub use self::cursor::{DataReader, DataWriter};
pub use self::index::IndexTable;
pub use self::serializer::DataSerializer;

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{ByteOrder, NativeEndian};

use crate::errors::*;

/// Size of the block size field at the start of every record.
pub const BLOCK_HEADER_SIZE: u64 = 8;

pub const DEFAULT_DATA_FILE: &str = "project.dat";
pub const DEFAULT_INDEX_FILE: &str = "project.idx";

/// A `DataFileManager` shared between the project and the loaders reading from it.
pub type SharedDataFile = Rc<RefCell<DataFileManager>>;

struct BoundFiles {
    directory: PathBuf,
    data: File,
    index: File,
}

/// Owner of the data file and index file of a project directory.
pub struct DataFileManager {
    data_file_name: String,
    index_file_name: String,
    files: Option<BoundFiles>,
    file_size: u64,
    table: IndexTable,
}

impl DataFileManager {
    /// Creates a new and unbound `DataFileManager` using the default file names.
    pub fn new() -> Self {
        DataFileManager::with_file_names(DEFAULT_DATA_FILE, DEFAULT_INDEX_FILE)
    }

    /// Creates a new and unbound `DataFileManager` with custom file names.
    pub fn with_file_names<T1, T2>(data_file_name: T1, index_file_name: T2) -> Self
    where
        T1: Into<String>,
        T2: Into<String>,
    {
        DataFileManager {
            data_file_name: data_file_name.into(),
            index_file_name: index_file_name.into(),
            files: None,
            file_size: 0,
            table: IndexTable::new(),
        }
    }

    /// Opens (creating them if absent) the data and index files in `directory`.
    ///
    /// Any previously bound files are closed and the in-memory index is cleared, but
    /// only once both new files have been opened successfully.
    pub fn bind<T: AsRef<Path>>(&mut self, directory: T) -> Result<()> {
        let directory = directory.as_ref();
        let data = Self::open(&directory.join(&self.data_file_name))?;
        let index = Self::open(&directory.join(&self.index_file_name))?;
        let file_size = data.metadata()?.len();

        self.reset();
        info!(
            "Binds data file at {:?} ({} bytes).",
            directory.join(&self.data_file_name),
            file_size
        );

        self.files = Some(BoundFiles {
            directory: directory.to_owned(),
            data,
            index,
        });
        self.file_size = file_size;
        Ok(())
    }

    fn open(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(file)
    }

    /// Closes both files and clears the in-memory index.
    pub fn reset(&mut self) {
        self.files = None;
        self.file_size = 0;
        self.table.clear();
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.files.is_some()
    }

    /// The directory the files are bound to.
    #[inline]
    pub fn directory(&self) -> Option<&Path> {
        self.files.as_ref().map(|v| v.directory.as_path())
    }

    #[inline]
    pub fn data_file_name(&self) -> &str {
        &self.data_file_name
    }

    #[inline]
    pub fn index_file_name(&self) -> &str {
        &self.index_file_name
    }

    /// Current length of the data file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    #[inline]
    pub fn index(&self) -> &IndexTable {
        &self.table
    }

    #[inline]
    pub fn contains(&self, entry_id: u32) -> bool {
        self.table.contains(entry_id)
    }

    /// Offset of the record of `entry_id`.
    #[inline]
    pub fn offset(&self, entry_id: u32) -> Option<u64> {
        self.table.get(entry_id)
    }

    /// Returns a reader positioned at the payload of `entry_id`.
    pub fn try_get_reader(&mut self, entry_id: u32) -> Result<DataReader<'_>> {
        if self.files.is_none() {
            return Err(Error::NotBound);
        }

        let offset = self
            .table
            .get(entry_id)
            .ok_or_else(|| Error::NotFound(format!("data entry {:08X}", entry_id)))?;
        let limit = self.slot_end(offset);

        let files = self.files.as_mut().ok_or(Error::NotBound)?;
        DataReader::new(&mut files.data, offset, limit)
    }

    /// Returns a writer for `entry_id`, and whether the entry existed already.
    ///
    /// An existing entry is rewritten at its current offset. A new entry is allocated
    /// at the end of the data file, with an empty block reserved right away.
    pub fn get_writer(&mut self, entry_id: u32) -> Result<(DataWriter<'_>, bool)> {
        if let Some(offset) = self.table.get(entry_id) {
            if self.files.is_none() {
                return Err(Error::NotBound);
            }

            return Ok((DataWriter::new(self, entry_id, offset, true), true));
        }

        let offset = self.file_size;
        self.write_record(offset, &[])?;
        self.table.insert(entry_id, offset);
        debug!("Allocates data entry {:08X} at {}.", entry_id, offset);

        Ok((DataWriter::new(self, entry_id, offset, false), false))
    }

    /// Removes `entry_id` from the index. Its record becomes dead space.
    pub fn remove(&mut self, entry_id: u32) -> bool {
        self.table.remove(entry_id).is_some()
    }

    pub(crate) fn commit(&mut self, entry_id: u32, offset: u64, payload: &[u8]) -> Result<u64> {
        let len = payload.len() as u64;

        let target = match self.capacity(offset) {
            Some(capacity) if len > capacity => {
                debug!(
                    "Relocates data entry {:08X} from {} to {} ({} bytes do not fit in {}).",
                    entry_id, offset, self.file_size, len, capacity
                );
                self.file_size
            }
            _ => offset,
        };

        self.write_record(target, payload)?;
        self.table.insert(entry_id, target);
        Ok(target)
    }

    /// Largest payload the slot at `offset` can hold, `None` if it is the last record.
    fn capacity(&self, offset: u64) -> Option<u64> {
        self.table
            .next_offset(offset)
            .map(|next| next.saturating_sub(offset.saturating_add(BLOCK_HEADER_SIZE)))
    }

    /// End of the slot at `offset`: the start of the next record, or the end of file.
    fn slot_end(&self, offset: u64) -> u64 {
        self.table.next_offset(offset).unwrap_or(self.file_size)
    }

    fn write_record(&mut self, offset: u64, payload: &[u8]) -> Result<()> {
        let files = self.files.as_mut().ok_or(Error::NotBound)?;

        let mut header = [0; BLOCK_HEADER_SIZE as usize];
        NativeEndian::write_u64(&mut header, payload.len() as u64);

        files.data.seek(SeekFrom::Start(offset))?;
        files.data.write_all(&header)?;
        files.data.write_all(payload)?;
        files.data.flush()?;

        let end = offset + BLOCK_HEADER_SIZE + payload.len() as u64;
        if end > self.file_size {
            self.file_size = end;
        }

        Ok(())
    }

    fn read_block_size(&mut self, offset: u64) -> Result<u64> {
        let limit = self.slot_end(offset);
        let files = self.files.as_mut().ok_or(Error::NotBound)?;

        let mut header = [0; BLOCK_HEADER_SIZE as usize];
        files.data.seek(SeekFrom::Start(offset))?;
        files.data.read_exact(&mut header)?;

        let block_size = NativeEndian::read_u64(&header);
        check_block(offset, block_size, limit)?;
        Ok(block_size)
    }

    /// Replaces the in-memory index with the content of the index file. An empty
    /// index file yields an empty index.
    pub fn load_index_table(&mut self) -> Result<()> {
        let files = self.files.as_mut().ok_or(Error::NotBound)?;

        files.index.seek(SeekFrom::Start(0))?;
        let table = if files.index.metadata()?.len() == 0 {
            IndexTable::new()
        } else {
            IndexTable::read_from(BufReader::new(&mut files.index))?
        };

        table.check_layout(self.file_size)?;
        info!("Loads {} data entries.", table.len());
        self.table = table;
        Ok(())
    }

    /// Regenerates the index file from the in-memory index.
    pub fn save_index_table(&mut self) -> Result<()> {
        let files = self.files.as_mut().ok_or(Error::NotBound)?;

        files.index.seek(SeekFrom::Start(0))?;
        files.index.set_len(0)?;
        self.table.write_to(BufWriter::new(&mut files.index))?;

        info!("Saves {} data entries.", self.table.len());
        Ok(())
    }

    /// Bytes of the data file not covered by any indexed record.
    pub fn reclaimable_bytes(&mut self) -> Result<u64> {
        let mut live = 0u64;
        for (_, offset) in self.table.by_offset() {
            live = live.saturating_add(BLOCK_HEADER_SIZE + self.read_block_size(offset)?);
        }

        self.file_size.checked_sub(live).ok_or_else(|| {
            Error::Malformed(format!(
                "Data records hold {} bytes, more than the {} bytes of the data file.",
                live, self.file_size
            ))
        })
    }

    /// Rewrites the data file with only the indexed records, packed in their current
    /// order, then saves the index. Returns the number of bytes reclaimed.
    ///
    /// The new files are written next to the old ones and renamed over them once
    /// complete, so a failure leaves the bound files untouched.
    pub fn compact(&mut self) -> Result<u64> {
        let directory = self.directory().ok_or(Error::NotBound)?.to_owned();
        let mut packed = Vec::new();
        let mut table = IndexTable::new();

        for (id, offset) in self.table.by_offset() {
            let block_size = self.read_block_size(offset)?;
            let start = packed.len();
            packed.resize(start + (BLOCK_HEADER_SIZE + block_size) as usize, 0);

            let files = self.files.as_mut().ok_or(Error::NotBound)?;
            files.data.seek(SeekFrom::Start(offset))?;
            files.data.read_exact(&mut packed[start..])?;
            table.insert(id, start as u64);
        }

        let data_path = directory.join(&self.data_file_name);
        let index_path = directory.join(&self.index_file_name);
        let staged_data = staging_path(&data_path);
        let staged_index = staging_path(&index_path);

        stage(&staged_data, |file| Ok(file.write_all(&packed)?))?;
        if let Err(err) = stage(&staged_index, |file| table.write_to(BufWriter::new(file))) {
            let _ = fs::remove_file(&staged_data);
            return Err(err);
        }

        fs::rename(&staged_data, &data_path)?;
        fs::rename(&staged_index, &index_path)?;

        let data = Self::open(&data_path)?;
        let index = Self::open(&index_path)?;
        let files = self.files.as_mut().ok_or(Error::NotBound)?;
        files.data = data;
        files.index = index;

        let reclaimed = self.file_size.saturating_sub(packed.len() as u64);
        info!("Compacts data file, {} bytes reclaimed.", reclaimed);

        self.file_size = packed.len() as u64;
        self.table = table;
        Ok(reclaimed)
    }
}

/// Fails unless the block of `block_size` bytes at `offset` ends before `limit`.
pub(crate) fn check_block(offset: u64, block_size: u64, limit: u64) -> Result<()> {
    let end = offset
        .checked_add(BLOCK_HEADER_SIZE)
        .and_then(|v| v.checked_add(block_size));

    match end {
        Some(end) if end <= limit => Ok(()),
        _ => Err(Error::Malformed(format!(
            "Data block at {} declares {} bytes past the end of its slot ({}).",
            offset, block_size, limit
        ))),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".compact");
    PathBuf::from(name)
}

fn stage<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let result = File::create(path)
        .map_err(Error::from)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        });

    if result.is_err() {
        let _ = fs::remove_file(path);
    }

    result
}

impl Default for DataFileManager {
    fn default() -> Self {
        DataFileManager::new()
    }
}
