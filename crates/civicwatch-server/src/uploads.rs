//! Image intake and removal. Files land under a generated
//! `<uuid>.<ext>` name via write-to-temp + rename; removal tolerates a
//! missing file so record deletion can proceed independently.

use civicwatch_api::ApiError;
use std::io;
use std::path::{Path, PathBuf};

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `bytes` under a fresh name derived from the client
    /// filename's extension. Returns the stored filename.
    pub fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::validation("uploaded image is empty"));
        }
        let extension = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| ApiError::validation("unsupported image type"))?;

        let filename = format!("{}.{extension}", uuid::Uuid::new_v4());
        let tmp = self.root.join(format!(".tmp-{filename}"));
        let path = self.root.join(&filename);
        std::fs::write(&tmp, bytes)
            .map_err(|e| ApiError::internal(format!("image write failed: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| ApiError::internal(format!("image write failed: {e}")))?;
        Ok(filename)
    }

    /// Best-effort removal. A missing file is not an error; a filename
    /// that escapes the upload directory is.
    pub fn delete(&self, filename: &str) -> io::Result<()> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to delete outside the upload directory",
            ));
        }
        match std::fs::remove_file(self.root.join(filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
