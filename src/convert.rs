//! Hands animated stickers to an external converter, `apng2gif` by default.

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

pub const DEFAULT_CONVERTER: &str = "apng2gif";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not launch {}", program.display())]
    Launch {
        program: PathBuf,
        source: io::Error,
    },

    #[error("{} exited with {status}", program.display())]
    Status {
        program: PathBuf,
        status: ExitStatus,
    },
}

#[async_trait]
pub trait Converter: Send + Sync {
    /// Converts the animated image at `source` and writes the result to
    /// `dest`.
    async fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError>;
}

/// Converter backed by an executable invoked as `<program> <source> <dest>`.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: PathBuf,
}

impl ExternalConverter {
    /// Looks for `program` next to the running executable, then in the
    /// current directory, then on `PATH`. Returns `None` if it's nowhere to
    /// be found.
    pub fn locate(program: &Path) -> Option<Self> {
        if program.components().count() > 1 {
            return is_executable(program).then(|| Self {
                program: program.to_owned(),
            });
        }

        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let current_dir = env::current_dir().ok();
        let path = env::var_os("PATH");

        search_dirs(exe_dir, current_dir, path.as_deref())
            .into_iter()
            .find_map(|dir| find_in(&dir, program.as_os_str()))
            .map(|program| Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Converter for ExternalConverter {
    async fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        log::trace!(
            "running {} {} {}",
            self.program.display(),
            source.display(),
            dest.display()
        );

        let status = Command::new(&self.program)
            .arg(source)
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|source| ConvertError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ConvertError::Status {
                program: self.program.clone(),
                status,
            })
        }
    }
}

fn search_dirs(
    exe_dir: Option<PathBuf>,
    current_dir: Option<PathBuf>,
    path: Option<&OsStr>,
) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = exe_dir.into_iter().chain(current_dir).collect();
    if let Some(path) = path {
        dirs.extend(env::split_paths(path));
    }
    dirs
}

fn find_in(dir: &Path, program: &OsStr) -> Option<PathBuf> {
    let candidate = dir.join(program);
    if is_executable(&candidate) {
        return Some(candidate);
    }

    if cfg!(windows) && candidate.extension().is_none() {
        let candidate = candidate.with_extension("exe");
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs_err::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
