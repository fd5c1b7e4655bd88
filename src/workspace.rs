//! A per-attempt temporary directory with guaranteed removal on every exit
//! path, built on `tempfile::TempDir`.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;
use crate::profile::Profile;

/// Owns a freshly created directory unique to one attempt. Source (and, for
/// compiled languages, the build artifact) live under it. Removed on drop,
/// regardless of success, failure, or panic unwinding through the guard.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("attempt-").tempdir()?;
        Ok(Workspace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `source_code` once, UTF-8 encoded, under the filename the
    /// profile dictates (`Main.<ext>` for Java, `main.<ext>` otherwise).
    pub fn write_source(&self, profile: &Profile, source_code: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(profile.source_filename());
        std::fs::write(&path, source_code)?;
        Ok(path)
    }

    /// Path the compiled artifact will be written to (`{exe}` in command
    /// templates).
    pub fn exe_path(&self) -> PathBuf {
        self.dir.path().join("prog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use crate::profile::profile_for;

    #[test]
    fn write_source_uses_profile_filename() {
        let ws = Workspace::create().unwrap();
        let path = ws
            .write_source(&profile_for(Language::Java), "class Main {}")
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "Main.java");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "class Main {}");
    }

    #[test]
    fn drop_removes_the_directory() {
        let path;
        {
            let ws = Workspace::create().unwrap();
            path = ws.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
