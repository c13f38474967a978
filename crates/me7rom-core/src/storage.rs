//! Loading and saving of tables and images

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// Where tables are read from and where dumps and patched images go
pub trait ArtifactStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>>;
    fn save(&mut self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Plain filesystem store
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl ArtifactStore for FileStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = fs::read(path)?;
        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(bytes)
    }

    fn save(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes)?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

/// `<rom>_patched.bin`, next to the input image
pub fn patched_image_path(rom_path: &Path) -> PathBuf {
    let mut name = rom_path.as_os_str().to_os_string();
    name.push("_patched.bin");
    PathBuf::from(name)
}

/// `<stem>_<crc>.bin`
pub fn table_dump_path(stem: &Path, crc: u32) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(format!("_{:x}.bin", crc));
    PathBuf::from(name)
}

/// In-memory store, for tests and dry runs
pub mod mock {
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};

    use super::ArtifactStore;
    use crate::error::Result;

    /// In-memory store that records every write
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub files: HashMap<PathBuf, Vec<u8>>,
        pub writes: Vec<PathBuf>,
    }

    impl MemoryStore {
        pub fn with_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
            self.files.insert(PathBuf::from(path), bytes);
            self
        }
    }

    impl ArtifactStore for MemoryStore {
        fn load(&self, path: &Path) -> Result<Vec<u8>> {
            self.files.get(path).cloned().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, path.display().to_string()).into()
            })
        }

        fn save(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
            self.files.insert(path.to_path_buf(), bytes.to_vec());
            self.writes.push(path.to_path_buf());
            Ok(())
        }
    }
}
