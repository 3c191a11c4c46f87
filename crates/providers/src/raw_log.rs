//! Diagnostic sink that appends every raw stream frame to a file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use forgeloop_core::RawFrameSink;

/// Appends one line per frame: an RFC 3339 timestamp, a tab, the payload.
pub struct FileRawLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileRawLog {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawFrameSink for FileRawLog {
    fn record(&self, raw: &str) {
        let line = format!(
            "{}\t{}\n",
            chrono::Utc::now().to_rfc3339(),
            raw.replace('\n', "\\n")
        );
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::debug!(path = %self.path.display(), error = %e, "Raw frame log write failed");
        }
    }
}
