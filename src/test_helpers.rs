//! Test utilities for creating temporary log files and mutating them the way
//! writers and log rotation do.

#[cfg(test)]
use std::fs::{self, File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::{Path, PathBuf};

#[cfg(test)]
pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempLogFile {
    /// Create an empty `test.log` in a fresh temporary directory
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file holding exactly `content`
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append(content)?;
        Ok(temp_file)
    }

    /// Append text without adding a newline
    pub fn append(&self, content: &str) -> std::io::Result<()> {
        self.append_bytes(content.as_bytes())
    }

    pub fn append_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        append_to_path(&self.path, bytes)
    }

    /// Append to another file, e.g. after a rename
    pub fn append_to(&self, path: &Path, content: &str) -> std::io::Result<()> {
        append_to_path(path, content.as_bytes())
    }

    /// Replace the file's content, creating it if needed
    pub fn write(&self, content: &str) -> std::io::Result<()> {
        fs::write(&self.path, content)
    }

    /// Truncate the file (simulate log rotation)
    pub fn truncate(&self) -> std::io::Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    /// Rename the file within its directory and return the new path
    pub fn rename_to(&self, name: &str) -> std::io::Result<PathBuf> {
        let target = self.sibling(name);
        fs::rename(&self.path, &target)?;
        Ok(target)
    }

    /// A path next to the log file
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }

    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
fn append_to_path(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
        assert_eq!(fs::read_to_string(temp_file.path()).unwrap(), "");
    }

    #[tokio::test]
    async fn test_temp_log_file_with_content() {
        let temp_file = TempLogFile::with_content("test line").unwrap();

        let file_content = fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(file_content, "test line");
    }

    #[tokio::test]
    async fn test_append() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append("line 1\n").unwrap();
        temp_file.append("line 2\n").unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\nline 2\n");
    }

    #[tokio::test]
    async fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_write() {
        let temp_file = TempLogFile::with_content("old").unwrap();
        temp_file.remove().unwrap();
        assert!(!temp_file.path().exists());

        temp_file.write("new").unwrap();
        assert_eq!(fs::read_to_string(temp_file.path()).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_rename_to() {
        let temp_file = TempLogFile::with_content("moved").unwrap();
        let target = temp_file.rename_to("b.log").unwrap();

        assert!(!temp_file.path().exists());
        assert_eq!(target, temp_file.sibling("b.log"));
        assert_eq!(fs::read_to_string(&target).unwrap(), "moved");
    }
}
