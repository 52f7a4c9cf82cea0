extern crate ravine;
extern crate tempfile;

use std::fs;
use std::path::Path;

use ravine::datafile::*;
use ravine::errors::*;

fn bound() -> (tempfile::TempDir, DataFileManager) {
    let dir = tempfile::tempdir().unwrap();
    let mut files = DataFileManager::new();
    files.bind(dir.path()).unwrap();
    (dir, files)
}

fn put(files: &mut DataFileManager, id: u32, bytes: &[u8]) -> u64 {
    let (mut writer, _) = files.get_writer(id).unwrap();
    writer.write_bytes(bytes);
    writer.close().unwrap()
}

fn write_index(dir: &Path, entries: &[(u32, u64)]) {
    let mut table = IndexTable::new();
    for &(id, offset) in entries {
        table.insert(id, offset);
    }

    let file = fs::File::create(dir.join("project.idx")).unwrap();
    table.write_to(file).unwrap();
}

fn is_malformed<T>(result: Result<T>) -> bool {
    match result {
        Err(Error::Malformed(_)) => true,
        _ => false,
    }
}

#[test]
fn index_survives_rebinding() {
    let (dir, mut files) = bound();
    put(&mut files, 7, b"seven");
    put(&mut files, 3, b"three");
    put(&mut files, 11, b"eleven");
    files.save_index_table().unwrap();

    let expected: Vec<(u32, u64)> = files.index().iter().collect();
    assert_eq!(expected.len(), 3);

    let mut fresh = DataFileManager::new();
    fresh.bind(dir.path()).unwrap();
    assert!(fresh.index().is_empty());
    fresh.load_index_table().unwrap();

    let loaded: Vec<(u32, u64)> = fresh.index().iter().collect();
    assert_eq!(loaded, expected);

    let mut reader = fresh.try_get_reader(11).unwrap();
    assert_eq!(reader.read_to_end().unwrap(), b"eleven");
}

#[test]
fn empty_index_file() {
    let (_dir, mut files) = bound();
    files.load_index_table().unwrap();
    assert!(files.index().is_empty());
}

#[test]
fn writers_and_readers() {
    let (_dir, mut files) = bound();
    assert_eq!(files.file_size(), 0);

    let (mut writer, existed) = files.get_writer(42).unwrap();
    assert!(!existed);
    assert_eq!(writer.offset(), 0);
    writer.write_u32(0xdead_beef);
    writer.write_f32(1.5);
    writer.write_bytes(b"tail");
    assert_eq!(writer.block_size(), 12);
    writer.close().unwrap();

    // Grows by the header plus the payload.
    assert_eq!(files.file_size(), BLOCK_HEADER_SIZE + 12);

    let mut reader = files.try_get_reader(42).unwrap();
    assert_eq!(reader.block_size(), 12);
    assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
    assert_eq!(reader.read_f32().unwrap(), 1.5);
    assert_eq!(reader.remaining(), 4);
    assert_eq!(reader.read_to_end().unwrap(), b"tail");

    let (writer, existed) = files.get_writer(42).unwrap();
    assert!(existed);
    assert_eq!(writer.offset(), 0);
    writer.close().unwrap();

    let before = files.file_size();
    let (mut writer, _) = files.get_writer(43).unwrap();
    assert_eq!(writer.offset(), before);
    writer.write_bytes(&[1, 2, 3]);
    writer.close().unwrap();
    assert_eq!(files.file_size(), before + BLOCK_HEADER_SIZE + 3);
}

#[test]
fn reads_stay_in_bounds() {
    let (_dir, mut files) = bound();
    put(&mut files, 1, &[1, 0, 0, 0]);
    put(&mut files, 2, &[9; 16]);

    let mut reader = files.try_get_reader(1).unwrap();
    match reader.read_u64() {
        Err(Error::OutOfBounds {
            requested,
            remaining,
        }) => {
            assert_eq!(requested, 8);
            assert_eq!(remaining, 4);
        }
        other => panic!("unexpected {:?}", other),
    }

    // Nothing was consumed.
    assert_eq!(reader.position(), 0);
    assert_eq!(reader.read_u8().unwrap(), 1);
    assert!(reader.skip(4).is_err());
    reader.skip(3).unwrap();
    assert!(reader.read_u8().is_err());
}

#[test]
fn unknown_entries() {
    let (_dir, mut files) = bound();
    match files.try_get_reader(5) {
        Err(Error::NotFound(_)) => {}
        _ => panic!("entry 5 should not exist"),
    }

    put(&mut files, 5, b"x");
    assert!(files.remove(5));
    assert!(!files.contains(5));
    assert_eq!(files.reclaimable_bytes().unwrap(), BLOCK_HEADER_SIZE + 1);
}

#[test]
fn growth_never_clobbers_neighbours() {
    let (_dir, mut files) = bound();
    put(&mut files, 1, b"aaaa");
    put(&mut files, 2, b"bbbb");
    put(&mut files, 3, b"cccc");

    let moved = put(&mut files, 2, b"BBBBBBBBBBBBBBBB");
    assert_eq!(moved, 3 * (BLOCK_HEADER_SIZE + 4));
    assert!(files.reclaimable_bytes().unwrap() > 0);

    for &(id, bytes) in &[
        (1, &b"aaaa"[..]),
        (2, &b"BBBBBBBBBBBBBBBB"[..]),
        (3, &b"cccc"[..]),
    ] {
        let mut reader = files.try_get_reader(id).unwrap();
        assert_eq!(reader.read_to_end().unwrap(), bytes);
    }

    files.compact().unwrap();
    assert_eq!(files.reclaimable_bytes().unwrap(), 0);

    // Shrinking fits in place.
    let offset = files.offset(2).unwrap();
    assert_eq!(put(&mut files, 2, b"b"), offset);
    let mut reader = files.try_get_reader(3).unwrap();
    assert_eq!(reader.read_to_end().unwrap(), b"cccc");
}

#[derive(Debug, Default, PartialEq)]
struct Header {
    version: u16,
    tags: Vec<String>,
}

impl DataSerializer for Header {
    fn serialize(&self, writer: &mut DataWriter<'_>) -> Result<()> {
        writer.write_u16(self.version);
        writer.write_serialized(&self.tags)
    }

    fn deserialize(&mut self, reader: &mut DataReader<'_>) -> Result<()> {
        self.version = reader.read_u16()?;
        self.tags = reader.read_serialized()?;
        Ok(())
    }
}

#[test]
fn serializers() {
    let (_dir, mut files) = bound();
    let header = Header {
        version: 3,
        tags: vec!["a".to_owned(), "bc".to_owned()],
    };

    assert!(!files.store("meta/header", &header).unwrap());
    assert!(files.store("meta/header", &header).unwrap());

    let mut restored = Header::default();
    assert!(files.restore("meta/header", &mut restored).unwrap());
    assert_eq!(restored, header);

    let mut untouched = Header::default();
    assert!(!files.restore("meta/missing", &mut untouched).unwrap());
    assert_eq!(untouched, Header::default());
}

#[test]
fn corrupt_index_tables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("project.dat"), [0u8; 32]).unwrap();
    let mut files = DataFileManager::new();

    let layouts = vec![
        vec![(1, 0), (2, 4)],
        vec![(1, 0), (2, 0)],
        vec![(1, 28)],
        vec![(1, u64::max_value())],
    ];

    for entries in &layouts {
        write_index(dir.path(), entries);
        files.bind(dir.path()).unwrap();
        assert!(is_malformed(files.load_index_table()));
        assert!(files.index().is_empty());
    }
}

#[test]
fn corrupt_block_headers() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = u64::max_value().to_ne_bytes().to_vec();
    data.extend_from_slice(&4u64.to_ne_bytes());
    data.extend_from_slice(b"abcd");
    fs::write(dir.path().join("project.dat"), &data).unwrap();
    write_index(dir.path(), &[(1, 0), (2, 8)]);

    let mut files = DataFileManager::new();
    files.bind(dir.path()).unwrap();
    files.load_index_table().unwrap();

    assert!(is_malformed(files.try_get_reader(1)));
    assert!(is_malformed(files.reclaimable_bytes()));
    assert!(is_malformed(files.compact()));

    let mut reader = files.try_get_reader(2).unwrap();
    assert_eq!(reader.read_to_end().unwrap(), b"abcd");
}

#[test]
fn failed_compaction_keeps_files() {
    let (dir, mut files) = bound();
    put(&mut files, 1, b"aaaa");
    put(&mut files, 2, b"bbbb");
    put(&mut files, 1, b"AAAAAAAAAAAA");
    files.save_index_table().unwrap();

    let size = files.file_size();
    let dead = files.reclaimable_bytes().unwrap();
    assert_eq!(dead, BLOCK_HEADER_SIZE + 4);

    // A directory in place of the staged data file makes the rewrite fail.
    let staged = dir.path().join("project.dat.compact");
    fs::create_dir(&staged).unwrap();
    assert!(files.compact().is_err());

    assert_eq!(files.file_size(), size);
    assert_eq!(files.reclaimable_bytes().unwrap(), dead);
    assert_eq!(files.try_get_reader(1).unwrap().read_to_end().unwrap(), b"AAAAAAAAAAAA");
    assert_eq!(files.try_get_reader(2).unwrap().read_to_end().unwrap(), b"bbbb");

    fs::remove_dir(&staged).unwrap();
    assert_eq!(files.compact().unwrap(), dead);
    assert_eq!(files.file_size(), size - dead);
    assert!(!dir.path().join("project.idx.compact").exists());

    let mut fresh = DataFileManager::new();
    fresh.bind(dir.path()).unwrap();
    fresh.load_index_table().unwrap();
    assert_eq!(fresh.index().iter().collect::<Vec<_>>(), files.index().iter().collect::<Vec<_>>());
    assert_eq!(fresh.try_get_reader(1).unwrap().read_to_end().unwrap(), b"AAAAAAAAAAAA");
    assert_eq!(fresh.try_get_reader(2).unwrap().read_to_end().unwrap(), b"bbbb");
}
