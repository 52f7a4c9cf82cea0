//! Raw bytes, the simplest payload there is.

use std::fs;
use std::ops::Deref;

use crate::datafile::SharedDataFile;
use crate::errors::*;
use crate::resource::{DataType, LoadingPhase, ResourceHandle};

use super::{LoadMethod, LoaderPlugin, UnloadMethod};

/// Just raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Loads files as `Bytes`.
///
/// Version 1 reads the file from the project directory every time. Version 2 reads
/// the copy packed into the project data file under the resource GUID, packing the
/// file on first load.
pub struct BytesLoader {
    data_type: DataType,
    files: SharedDataFile,
}

impl BytesLoader {
    pub fn new(data_type: DataType, files: SharedDataFile) -> Self {
        BytesLoader { data_type, files }
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    fn load_from_disk(&self, rsc: ResourceHandle) -> DataType {
        let path = rsc.borrow().full_path();
        match fs::read(&path) {
            Ok(bytes) => rsc.borrow_mut().set_data(Bytes(bytes)),
            Err(err) => {
                warn!("[BytesLoader] can not read {:?}: {}", path, err);
                rsc.set_phase(LoadingPhase::Error);
            }
        }

        self.data_type
    }

    fn load_packed(&self, rsc: ResourceHandle) -> DataType {
        match self.read_packed(&rsc) {
            Ok(bytes) => rsc.borrow_mut().set_data(Bytes(bytes)),
            Err(err) => {
                warn!("[BytesLoader] can not load {:08X}: {}", rsc.guid(), err);
                rsc.set_phase(LoadingPhase::Error);
            }
        }

        self.data_type
    }

    fn read_packed(&self, rsc: &ResourceHandle) -> Result<Vec<u8>> {
        let guid = rsc.guid();
        let mut files = self.files.borrow_mut();

        match files.try_get_reader(guid) {
            Ok(mut reader) => return reader.read_to_end(),
            Err(Error::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let bytes = fs::read(rsc.borrow().full_path())?;
        let (mut writer, _) = files.get_writer(guid)?;
        writer.write_bytes(&bytes);
        writer.close()?;

        debug!("[BytesLoader] packs {} bytes of {:08X}.", bytes.len(), guid);
        Ok(bytes)
    }

    fn unload(&self, rsc: ResourceHandle) {
        rsc.borrow_mut().take_data();
    }
}

impl LoaderPlugin for BytesLoader {
    const NAME: &'static str = "bytes";

    fn commands() -> Vec<(LoadMethod<Self>, UnloadMethod<Self>)> {
        vec![
            (
                Self::load_from_disk as LoadMethod<Self>,
                Self::unload as UnloadMethod<Self>,
            ),
            (
                Self::load_packed as LoadMethod<Self>,
                Self::unload as UnloadMethod<Self>,
            ),
        ]
    }
}
