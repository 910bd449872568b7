//! FFmpeg / FFprobe command wrapper utilities

use std::path::Path;
use std::process::{Command, Output};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("{0} not found in system PATH")]
    NotInstalled(String),

    #[error("{tool} execution failed: {stderr}")]
    ExecutionFailed { tool: String, stderr: String },
}

/// Builder for a single `ffmpeg` or `ffprobe` invocation.
pub struct FfmpegCommand {
    program: String,
    args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn probe() -> Self {
        Self::with_program("ffprobe")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Overwrite output files without asking
    pub fn overwrite(mut self) -> Self {
        self.args.push("-y".to_string());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    pub fn execute(self) -> Result<Output, FfmpegError> {
        if !is_tool_installed(&self.program) {
            return Err(FfmpegError::NotInstalled(self.program));
        }

        debug!("Running {} {}", self.program, self.args.join(" "));

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| FfmpegError::ExecutionFailed {
                tool: self.program.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FfmpegError::ExecutionFailed {
                tool: self.program,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether `<program> -version` can be spawned
pub fn is_tool_installed(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_argument_order() {
        let cmd = FfmpegCommand::new()
            .overwrite()
            .input("/videos/in.mp4")
            .args(&["-q:v", "2"])
            .output("/out/frame-%06d.jpg");

        assert_eq!(cmd.program(), "ffmpeg");
        assert_eq!(
            cmd.arg_list(),
            &["-y", "-i", "/videos/in.mp4", "-q:v", "2", "/out/frame-%06d.jpg"]
        );
    }

    #[test]
    fn test_missing_tool_reports_not_installed() {
        let err = FfmpegCommand::with_program("definitely-not-a-real-ffmpeg-binary")
            .args(&["-version"])
            .execute()
            .unwrap_err();

        assert!(matches!(err, FfmpegError::NotInstalled(ref p) if p == "definitely-not-a-real-ffmpeg-binary"));
    }
}
