//! ROOT container parsing: file header, key directory, payload access.
//!
//! The DQM histogram files are flat: every histogram is a top-level key.
//! The key list is parsed once at open; lookups pick the highest cycle for
//! a name, matching how ROOT resolves same-named keys.

use crate::root::buffer::Reader;
use crate::root::decompress::decompress;
use crate::root::error::{Result, RootError};
use crate::root::histogram::{Hist1, Hist2};
use crate::root::objects;
use std::fs;
use std::path::{Path, PathBuf};

const ROOT_MAGIC: &[u8; 4] = b"root";

enum Bytes {
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl Bytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Mapped(m) => m,
            Bytes::Owned(v) => v,
        }
    }
}

/// One parsed TKey record.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    /// Compressed object size plus key header.
    n_bytes: u32,
    /// Uncompressed object length.
    obj_len: u32,
    /// Length of the key header itself.
    key_len: u16,
    /// Cycle number (versioning within a directory).
    cycle: u16,
    /// Absolute position of this key in the file.
    seek_key: u64,
    pub class_name: String,
    pub name: String,
}

impl KeyRecord {
    fn parse(r: &mut Reader, is_large: bool) -> Result<Self> {
        let n_bytes = r.read_u32()?;
        let version = r.read_u16()?;
        let obj_len = r.read_u32()?;
        let _datime = r.read_u32()?;
        let key_len = r.read_u16()?;
        let cycle = r.read_u16()?;

        let (seek_key, _seek_pdir) = if version > 1000 || is_large {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64)
        };

        let class_name = r.read_string()?;
        let name = r.read_string()?;
        let _title = r.read_string()?;

        Ok(KeyRecord {
            n_bytes,
            obj_len,
            key_len,
            cycle,
            seek_key,
            class_name,
            name,
        })
    }
}

/// A read-only ROOT file with its top-level key directory.
pub struct RootFile {
    bytes: Bytes,
    path: PathBuf,
    keys: Vec<KeyRecord>,
}

impl RootFile {
    /// Open and parse a file from disk via memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::File::open(&path)?;
        // SAFETY: the mapping is only read, and the histogram files are not
        // rewritten while a DQM pass runs.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::parse(Bytes::Mapped(mmap), path)
    }

    /// Parse a file from an in-memory byte vector.
    pub fn from_bytes(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        Self::parse(Bytes::Owned(data), path)
    }

    fn parse(bytes: Bytes, path: PathBuf) -> Result<Self> {
        let data = bytes.as_slice();
        if data.len() < 64 || &data[0..4] != ROOT_MAGIC {
            return Err(RootError::BadMagic);
        }

        // File header:
        //   magic, fVersion, fBEGIN, fEND, fSeekFree, fNbytesFree, nfree,
        //   fNbytesName, fUnits, fCompress, fSeekInfo, fNbytesInfo, fUUID.
        // Seek widths double past version 1000000.
        let mut r = Reader::at(data, 4);
        let version = r.read_u32()?;
        let is_large = version >= 1_000_000;
        let begin = r.read_u32()? as u64;
        if is_large {
            let _end = r.read_u64()?;
            let _seek_free = r.read_u64()?;
        } else {
            let _end = r.read_u32()?;
            let _seek_free = r.read_u32()?;
        }
        let _nbytes_free = r.read_u32()?;
        let _nfree = r.read_u32()?;
        let nbytes_name = r.read_u32()?;
        let _units = r.read_u8()?;
        let _compress = r.read_u32()?;

        // The TDirectory streamer sits at fBEGIN + fNbytesName and yields the
        // seek position of the key list.
        let dir_offset = begin as usize + nbytes_name as usize;
        if dir_offset >= data.len() {
            return Err(RootError::Deserialization(
                "TDirectory offset past end of file".into(),
            ));
        }
        let mut r = Reader::at(data, dir_offset);
        let dir_version = r.read_u16()?;
        let _datime_c = r.read_u32()?;
        let _datime_m = r.read_u32()?;
        let _nbytes_keys = r.read_u32()?;
        let _nbytes_name = r.read_u32()?;
        let seek_keys = if dir_version > 1000 {
            let _seek_dir = r.read_u64()?;
            let _seek_parent = r.read_u64()?;
            r.read_u64()?
        } else {
            let _seek_dir = r.read_u32()?;
            let _seek_parent = r.read_u32()?;
            r.read_u32()? as u64
        };

        let keys = Self::parse_key_list(data, seek_keys as usize, is_large)?;
        Ok(Self { bytes, path, keys })
    }

    /// The key list is itself stored as a TKey whose payload is a u32 count
    /// followed by that many TKey records.
    fn parse_key_list(data: &[u8], seek_keys: usize, is_large: bool) -> Result<Vec<KeyRecord>> {
        let mut r = Reader::at(data, seek_keys);
        let _list_key = KeyRecord::parse(&mut r, is_large)?;
        let n_keys = r.read_u32()? as usize;
        let mut keys = Vec::with_capacity(n_keys);
        for _ in 0..n_keys {
            keys.push(KeyRecord::parse(&mut r, is_large)?);
        }
        Ok(keys)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All top-level keys, in file order.
    pub fn keys(&self) -> &[KeyRecord] {
        &self.keys
    }

    fn find_key(&self, name: &str) -> Result<&KeyRecord> {
        self.keys
            .iter()
            .filter(|k| k.name == name)
            .max_by_key(|k| k.cycle)
            .ok_or_else(|| RootError::KeyNotFound(name.to_string()))
    }

    /// Fetch a 1-D histogram (TH1F/TH1D) by name.
    pub fn hist1(&self, name: &str) -> Result<Hist1> {
        let key = self.find_key(name)?;
        let payload = self.key_payload(key)?;
        objects::read_hist1(&payload, &key.class_name)
    }

    /// Fetch a 2-D histogram (TH2F/TH2D) by name.
    pub fn hist2(&self, name: &str) -> Result<Hist2> {
        let key = self.find_key(name)?;
        let payload = self.key_payload(key)?;
        objects::read_hist2(&payload, &key.class_name)
    }

    /// Decompressed object bytes for a key.
    fn key_payload(&self, key: &KeyRecord) -> Result<Vec<u8>> {
        let data = self.bytes.as_slice();
        let start = key.seek_key as usize;
        let end = start + key.n_bytes as usize;
        if end > data.len() {
            return Err(RootError::BufferUnderflow {
                offset: start,
                need: key.n_bytes as usize,
                have: data.len().saturating_sub(start),
            });
        }

        let object = &data[start + key.key_len as usize..end];
        if object.len() == key.obj_len as usize {
            Ok(object.to_vec())
        } else {
            decompress(object, key.obj_len as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::testfile::FileBuilder;

    #[test]
    fn rejects_non_root_bytes() {
        let result = RootFile::from_bytes(vec![0u8; 200], PathBuf::from("junk.root"));
        assert!(matches!(result, Err(RootError::BadMagic)));
    }

    #[test]
    fn lists_keys_and_fetches_histograms() {
        let mut fb = FileBuilder::new();
        fb.add_th1d("hist_a", 4, 0.0, 4.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
        fb.add_th2d("hist_b", 2, 0.0, 2.0, 3, 0.0, 3.0, &[1.0; 6]);
        let file = RootFile::from_bytes(fb.build("dqm.root"), PathBuf::from("dqm.root")).unwrap();

        let names: Vec<_> = file.keys().iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["hist_a", "hist_b"]);

        let h1 = file.hist1("hist_a").unwrap();
        assert_eq!(h1.content, vec![1.0, 2.0, 3.0, 4.0]);

        let h2 = file.hist2("hist_b").unwrap();
        assert_eq!((h2.nx, h2.ny), (2, 3));
    }

    #[test]
    fn missing_key_is_typed() {
        let mut fb = FileBuilder::new();
        fb.add_th1d("hist_a", 1, 0.0, 1.0, &[0.0, 5.0, 0.0]);
        let file = RootFile::from_bytes(fb.build("dqm.root"), PathBuf::from("dqm.root")).unwrap();

        assert!(matches!(
            file.hist1("hist_missing"),
            Err(RootError::KeyNotFound(_))
        ));
    }

    #[test]
    fn wrong_dimensionality_is_rejected() {
        let mut fb = FileBuilder::new();
        fb.add_th1d("hist_a", 1, 0.0, 1.0, &[0.0, 5.0, 0.0]);
        let file = RootFile::from_bytes(fb.build("dqm.root"), PathBuf::from("dqm.root")).unwrap();

        assert!(matches!(
            file.hist2("hist_a"),
            Err(RootError::Deserialization(_))
        ));
    }
}
