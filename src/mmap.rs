//! Memory-mapping utility
//!
//! Leaf resource provider used by capability implementations and engines
//! alike: open a file-backed mapping, read or write through it, and rely on
//! the handle's drop to close the mapping on every exit path.

use crate::error::{Result, ServiceError};
use memmap2::{Mmap, MmapMut};
use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug)]
enum Mapping {
    Ro(Mmap),
    Rw(MmapMut),
}

/// A file-backed memory mapping. Closing is drop-based, so the mapping is
/// released even on early-error paths.
#[derive(Debug)]
pub struct MappedFile {
    mapping: Mapping,
    len: usize,
}

impl MappedFile {
    /// Map an existing file.
    pub fn open(path: &Path, mode: MapMode) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode == MapMode::ReadWrite)
            .open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Err(ServiceError::CapabilityFailure(format!(
                "cannot map empty file {}",
                path.display()
            )));
        }
        let mapping = match mode {
            // Safety: the mapping is private to this handle and the file
            // stays open for the handle's lifetime.
            MapMode::ReadOnly => Mapping::Ro(unsafe { Mmap::map(&file)? }),
            MapMode::ReadWrite => Mapping::Rw(unsafe { MmapMut::map_mut(&file)? }),
        };
        Ok(MappedFile { mapping, len })
    }

    /// Create (or truncate) a file of `len` bytes and map it read-write.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ServiceError::CapabilityFailure(
                "mapping length must be non-zero".to_string(),
            ));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len as u64)?;
        let mapping = Mapping::Rw(unsafe { MmapMut::map_mut(&file)? });
        Ok(MappedFile { mapping, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            Mapping::Ro(m) => m,
            Mapping::Rw(m) => m,
        }
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &mut self.mapping {
            Mapping::Ro(_) => Err(ServiceError::CapabilityFailure(
                "mapping is read-only".to_string(),
            )),
            Mapping::Rw(m) => Ok(&mut m[..]),
        }
    }

    /// Flush dirty pages to the backing file.
    pub fn flush(&self) -> Result<()> {
        if let Mapping::Rw(m) = &self.mapping {
            m.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_write_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.map");

        {
            let mut map = MappedFile::create(&path, 64).unwrap();
            map.as_mut_slice().unwrap()[..5].copy_from_slice(b"rookd");
            map.flush().unwrap();
        } // dropped here, mapping closed

        let map = MappedFile::open(&path, MapMode::ReadOnly).unwrap();
        assert_eq!(map.len(), 64);
        assert_eq!(&map.as_slice()[..5], b"rookd");
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.map");
        MappedFile::create(&path, 16).unwrap();

        let mut map = MappedFile::open(&path, MapMode::ReadOnly).unwrap();
        assert!(map.as_mut_slice().is_err());
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.map");
        assert!(MappedFile::create(&path, 0).is_err());
        std::fs::File::create(&path).unwrap();
        assert!(MappedFile::open(&path, MapMode::ReadOnly).is_err());
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = MappedFile::open(&dir.path().join("nope"), MapMode::ReadOnly).unwrap_err();
        assert!(matches!(err, ServiceError::IoError(_)));
    }
}
