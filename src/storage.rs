//! Quickstat - Upload directory
//!
//! Uploaded files live flat in one directory under their client-supplied
//! name, after sanitising away any path component.
//!
//! Writes go to a uniquely named temp file in the same directory and are then
//! renamed over the target, so a reader never sees a half-written file and
//! two concurrent uploads never interleave their bytes. Two uploads with the
//! same name still race: the last rename wins. Each request summarises its
//! own bytes, so only the later download is affected.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Prefix of in-flight temp files; sanitised names can never collide with it
const TEMP_PREFIX: &str = ".upload-";

/// Reduce a client-supplied name to a bare file name.
///
/// Keeps the last `/` or `\` separated component. Returns `None` for names
/// that are empty, hidden (`.`, `..`, `.env`) or contain control characters.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base.starts_with('.') || base.chars().any(char::is_control) {
        return None;
    }
    Some(base.to_string())
}

/// Guess a download content type from the file extension
pub fn content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => "text/csv",
        Some("tsv") => "text/tab-separated-values",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Flat directory of uploaded files
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Use `dir` as the upload directory, creating it if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `data` under the sanitised form of `name`, replacing any
    /// previous file of that name. Returns the final path.
    pub fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let Some(name) = sanitize_filename(name) else {
            bail!("Invalid file name: {:?}", name);
        };
        let path = self.root.join(&name);

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)
            .with_context(|| format!("Failed to create temp file in {}", self.root.display()))?;
        tmp.write_all(data)
            .with_context(|| format!("Failed to write upload: {}", name))?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to store upload: {}", path.display()))?;

        debug!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    /// Read a stored file. Unknown names and names that are not already a
    /// bare file name yield `None`.
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if sanitize_filename(name).as_deref() != Some(name) {
            return Ok(None);
        }
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("data.csv").as_deref(), Some("data.csv"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\temp\\x.csv").as_deref(), Some("x.csv"));
        assert_eq!(sanitize_filename(" spaced.csv ").as_deref(), Some("spaced.csv"));
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".hidden"), None);
        assert_eq!(sanitize_filename("bad\0name"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a.csv"), "text/csv");
        assert_eq!(content_type("a.CSV"), "text/csv");
        assert_eq!(content_type("a.tsv"), "text/tab-separated-values");
        assert_eq!(content_type("a"), "application/octet-stream");
    }

    #[test]
    fn test_open_creates_directory() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("a").join("uploads");
        let store = UploadStore::open(&nested)?;
        assert!(store.root().is_dir());
        Ok(())
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::open(dir.path())?;
        let data = b"a,b\n1,2\n\xff raw bytes\n";

        let path = store.save("../sneaky.csv", data)?;
        assert_eq!(path, dir.path().join("sneaky.csv"));
        assert_eq!(store.load("sneaky.csv")?.as_deref(), Some(&data[..]));
        Ok(())
    }

    #[test]
    fn test_save_replaces_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::open(dir.path())?;
        store.save("x.csv", b"first")?;
        store.save("x.csv", b"second")?;
        assert_eq!(store.load("x.csv")?.as_deref(), Some(&b"second"[..]));

        // No temp files left behind
        let entries = fs::read_dir(dir.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }

    #[test]
    fn test_load_rejects_unknown_and_unsafe_names() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::open(dir.path().join("uploads"))?;
        fs::write(dir.path().join("secret.txt"), b"secret")?;

        assert_eq!(store.load("missing.csv")?, None);
        assert_eq!(store.load("../secret.txt")?, None);
        assert_eq!(store.load("..")?, None);
        Ok(())
    }

    #[test]
    fn test_save_rejects_invalid_name() -> Result<()> {
        let dir = tempdir()?;
        let store = UploadStore::open(dir.path())?;
        assert!(store.save("..", b"x").is_err());
        Ok(())
    }
}
