//! Where a document's bytes come from.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Byte source for a decoder
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl DocumentSource {
    /// Read the whole source into memory
    pub fn read_all(self) -> io::Result<Vec<u8>> {
        match self {
            DocumentSource::Path(path) => fs::read(path),
            DocumentSource::Bytes(bytes) => Ok(bytes),
            DocumentSource::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            DocumentSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for DocumentSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Box<dyn Read + Send>> for DocumentSource {
    fn from(value: Box<dyn Read + Send>) -> Self {
        Self::Reader(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_all_from_each_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(DocumentSource::from(path.as_path()).read_all().unwrap(), b"abc");
        assert_eq!(DocumentSource::from(b"xyz".to_vec()).read_all().unwrap(), b"xyz");

        let reader: Box<dyn Read + Send> = Box::new(Cursor::new(b"stream".to_vec()));
        assert_eq!(DocumentSource::from(reader).read_all().unwrap(), b"stream");
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = DocumentSource::from(PathBuf::from("/definitely/not/here.png"))
            .read_all()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_debug_hides_contents() {
        let source = DocumentSource::from(vec![0u8; 16]);
        assert_eq!(format!("{source:?}"), "Bytes(16 bytes)");
    }
}
