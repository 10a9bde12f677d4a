//! EEPROM images: a volatile one for tests/simulation and a file-backed one
//! that survives restarts.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use transducer_traits::{BoxError, NvStorage};

use crate::atomic::write_atomic;
use crate::error::HwError;

/// Value of a never-written cell.
pub const ERASED: u8 = 0xFF;

/// In-memory EEPROM; starts fully erased.
#[derive(Debug, Clone)]
pub struct MemEeprom {
    cells: Vec<u8>,
    writes: usize,
}

impl MemEeprom {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![ERASED; capacity],
            writes: 0,
        }
    }

    /// Build from an existing image (e.g. a dump read back from a device).
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            cells: image,
            writes: 0,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.cells
    }

    /// Number of cell writes actually performed (unchanged updates are skipped).
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn check(&self, addr: usize) -> crate::error::Result<()> {
        if addr >= self.cells.len() {
            return Err(HwError::AddressOutOfRange {
                addr,
                capacity: self.cells.len(),
            });
        }
        Ok(())
    }

    fn update_cell(&mut self, addr: usize, value: u8) -> crate::error::Result<bool> {
        self.check(addr)?;
        if self.cells[addr] == value {
            return Ok(false);
        }
        self.cells[addr] = value;
        self.writes += 1;
        Ok(true)
    }
}

impl NvStorage for MemEeprom {
    fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn read(&mut self, addr: usize) -> Result<u8, BoxError> {
        self.check(addr)?;
        Ok(self.cells[addr])
    }

    fn update(&mut self, addr: usize, value: u8) -> Result<(), BoxError> {
        self.update_cell(addr, value)?;
        Ok(())
    }
}

/// EEPROM image persisted to a file. Missing file means a fully erased part.
///
/// Updates land in memory; `flush` rewrites the file atomically, and only when
/// some cell actually changed.
#[derive(Debug)]
pub struct FileEeprom {
    path: PathBuf,
    mem: MemEeprom,
    dirty: bool,
}

impl FileEeprom {
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> crate::error::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut image = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), bytes = image.len(), capacity, "eeprom image opened");
        image.resize(capacity, ERASED);
        Ok(Self {
            path,
            mem: MemEeprom::from_image(image),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NvStorage for FileEeprom {
    fn capacity(&self) -> usize {
        self.mem.capacity()
    }

    fn read(&mut self, addr: usize) -> Result<u8, BoxError> {
        self.mem.read(addr)
    }

    fn update(&mut self, addr: usize, value: u8) -> Result<(), BoxError> {
        if self.mem.update_cell(addr, value)? {
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        if !self.dirty {
            trace!("eeprom flush skipped, image unchanged");
            return Ok(());
        }
        write_atomic(&self.path, self.mem.image()).map_err(HwError::from)?;
        self.dirty = false;
        debug!(path = %self.path.display(), "eeprom image written");
        Ok(())
    }
}
