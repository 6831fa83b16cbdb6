use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use crate::{FilterGraph, ProbeReport, Result, WaveVizError};

/// The external media tool, seen through the two calls the visualiser makes.
pub trait MediaEngine {
    /// Reads container and stream metadata without decoding.
    fn probe(&self, path: &Path) -> Result<ProbeReport>;

    /// Runs the graph to completion, blocking until the output is written.
    fn execute(&self, graph: &FilterGraph) -> Result<()>;
}

/// [`MediaEngine`] backed by the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    overwrite: bool,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            overwrite: false,
        }
    }
}

impl FfmpegEngine {
    /// Uses `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            ..Self::default()
        }
    }

    /// Replace an existing output file instead of letting ffmpeg ask.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn probe_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(path.as_os_str().to_owned());
        args
    }

    /// Full ffmpeg argument list for `graph`, without the program name.
    pub fn execute_args(&self, graph: &FilterGraph) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into()];
        if self.overwrite {
            args.push("-y".into());
        }
        args.extend(graph.to_ffmpeg_args());
        args
    }

    /// Human-readable command line, quoted for a POSIX shell.
    pub fn command_line(&self, graph: &FilterGraph) -> String {
        std::iter::once(self.ffmpeg.as_os_str().to_owned())
            .chain(self.execute_args(graph))
            .map(|arg| shell_quote(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> Result<ProbeReport> {
        tracing::debug!(ffprobe = ?self.ffprobe, ?path, "running ffprobe");
        let out = Command::new(&self.ffprobe)
            .args(Self::probe_args(path))
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                WaveVizError::probe(path, format!("failed to run {}: {err}", self.ffprobe.display()))
            })?;

        if !out.status.success() {
            return Err(WaveVizError::probe(
                path,
                format!(
                    "ffprobe exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            ));
        }
        ProbeReport::from_json(path, &out.stdout)
    }

    fn execute(&self, graph: &FilterGraph) -> Result<()> {
        tracing::debug!(command = %self.command_line(graph), "running ffmpeg");
        let status = Command::new(&self.ffmpeg)
            .args(self.execute_args(graph))
            .status()
            .map_err(|err| {
                WaveVizError::Execution(format!("failed to run {}: {err}", self.ffmpeg.display()))
            })?;
        check_status(status)
    }
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    if killed_by_sigpipe(status) {
        return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
    }
    Err(WaveVizError::Execution(format!("ffmpeg exited with {status}")))
}

#[cfg(unix)]
fn killed_by_sigpipe(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    const SIGPIPE: i32 = 13;
    status.signal() == Some(SIGPIPE)
}

#[cfg(not(unix))]
fn killed_by_sigpipe(_status: ExitStatus) -> bool {
    false
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
