//! Size-rotated log file writer.
//!
//! `escan.log` is the live file; rotation shifts it to `escan.log.1`, `escan.log.1` to
//! `escan.log.2`, and so on, dropping the oldest once `max_files` is reached.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub(crate) struct RollingFile {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFile {
    pub(crate) fn open(
        dir: PathBuf,
        base_name: &str,
        max_files: usize,
        max_size: u64,
    ) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut rolling = Self {
            dir,
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        rolling.reopen()?;
        if rolling.current_size > rolling.max_size {
            rolling.rotate()?;
        }
        Ok(rolling)
    }

    pub(crate) fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.current_size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let keep = self.max_files - 1;
        if keep == 0 {
            // No history kept: start the live file over.
            fs::remove_file(self.current_path()).or_else(ignore_missing)?;
            return self.reopen();
        }

        fs::remove_file(self.rotated_path(keep)).or_else(ignore_missing)?;
        for idx in (1..keep).rev() {
            let src = self.rotated_path(idx);
            if src.exists() {
                fs::rename(&src, self.rotated_path(idx + 1))?;
            }
        }
        let current = self.current_path();
        if current.exists() {
            fs::rename(current, self.rotated_path(1))?;
        }

        self.reopen()
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let written = file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Cloneable handle handed to `tracing_subscriber` as a `MakeWriter`.
#[derive(Clone)]
pub(crate) struct SharedRollingFile {
    inner: Arc<Mutex<RollingFile>>,
}

impl SharedRollingFile {
    pub(crate) fn new(rolling: RollingFile) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rolling)),
        }
    }
}

pub(crate) struct SharedRollingFileGuard {
    inner: Arc<Mutex<RollingFile>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingFile {
    type Writer = SharedRollingFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedRollingFileGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedRollingFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "escan".to_string()
    } else {
        cleaned
    }
}
