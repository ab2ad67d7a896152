use std::io;
use std::path::{Path, PathBuf};

use log::info;

/// Synk av hele filer mot varig ekstern lagring, kun ved jobbgrenser
/// (aldri midt i pipeline). Skyimplementasjoner lever utenfor core;
/// her følger en lokal speilkatalog for kjøringer uten sky.
pub trait FileSync {
    /// Henter `name` fra ekstern lagring til `dest`. Manglende fil er
    /// ikke en feil – førstegangskjøringer starter tomt.
    fn pull_file(&self, name: &str, dest: &Path) -> io::Result<()>;

    /// Skyver `src` til ekstern lagring under `name`.
    fn push_file(&self, src: &Path, name: &str) -> io::Result<()>;

    /// Henter en hel katalog (sesjonstokens).
    fn pull_dir(&self, name: &str, dest: &Path) -> io::Result<()>;

    /// Skyver en hel katalog.
    fn push_dir(&self, src: &Path, name: &str) -> io::Result<()>;
}

/// Speiler filer til en annen lokal katalog.
pub struct MirrorSync {
    remote_dir: PathBuf,
}

impl MirrorSync {
    pub fn new(remote_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_dir: remote_dir.into(),
        }
    }
}

impl FileSync for MirrorSync {
    fn pull_file(&self, name: &str, dest: &Path) -> io::Result<()> {
        let src = self.remote_dir.join(name);
        if !src.is_file() {
            return Ok(());
        }
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::copy(&src, dest)?;
        info!("pulled {} -> {}", src.display(), dest.display());
        Ok(())
    }

    fn push_file(&self, src: &Path, name: &str) -> io::Result<()> {
        let dest = self.remote_dir.join(name);
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::copy(src, &dest)?;
        info!("pushed {} -> {}", src.display(), dest.display());
        Ok(())
    }

    fn pull_dir(&self, name: &str, dest: &Path) -> io::Result<()> {
        let src = self.remote_dir.join(name);
        if !src.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(&src)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::copy(entry.path(), dest.join(entry.file_name()))?;
            }
        }
        Ok(())
    }

    fn push_dir(&self, src: &Path, name: &str) -> io::Result<()> {
        let dest = self.remote_dir.join(name);
        std::fs::create_dir_all(&dest)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::copy(entry.path(), dest.join(entry.file_name()))?;
            }
        }
        Ok(())
    }
}
