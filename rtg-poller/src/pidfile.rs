//! Process exclusivity marker
//!
//! The pid file is written at startup and removed when the guard drops.
//! A file naming a live process is a startup error; a stale one is
//! replaced.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    #[error("another poller is running (pid {pid}, see {path})")]
    AlreadyRunning { pid: i32, path: PathBuf },
    #[error("pid file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

fn process_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

impl PidFile {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, PidFileError> {
        let path = path.into();
        let io_err = |source| PidFileError::Io {
            path: path.clone(),
            source,
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let existing = content.trim().parse::<i32>().ok().filter(|p| *p > 0);
                match existing {
                    Some(pid) if pid != std::process::id() as i32 && process_alive(pid) => {
                        return Err(PidFileError::AlreadyRunning {
                            pid,
                            path: path.clone(),
                        });
                    }
                    Some(pid) => tracing::warn!(pid, path = %path.display(), "replacing stale pid file"),
                    None => tracing::warn!(path = %path.display(), "replacing unreadable pid file"),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, format!("{}\n", std::process::id())).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "pid file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "pid file removed"),
            Err(e) => tracing::warn!(path = %self.path.display(), "cannot remove pid file: {e}"),
        }
    }
}
