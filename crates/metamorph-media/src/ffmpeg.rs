//! FFmpeg command construction and execution for the motion-image and
//! motion-video encode steps.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use metamorph_models::VideoTarget;

use crate::error::{MediaError, MediaResult};

/// Builder for an ffmpeg invocation: input/output paths plus the output
/// args accumulated by the `video_target`-specific encoder settings.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    input_args: Vec<String>,
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Builds the command for encoding `input` (a single video/GIF file or
    /// a frame-sequence glob) to `video_target`, matching the codec
    /// settings table.
    pub fn for_video_target(input: impl AsRef<Path>, output: impl AsRef<Path>, target: VideoTarget) -> Self {
        let cmd = Self::new(input, output).output_arg("-vf").output_arg("scale=512:-1:flags=lanczos");
        match target {
            VideoTarget::MP4 => cmd
                .output_arg("-c:v")
                .output_arg("libx264")
                .output_arg("-pix_fmt")
                .output_arg("yuv420p")
                .output_arg("-crf")
                .output_arg("28")
                .output_arg("-preset")
                .output_arg("veryfast")
                .output_arg("-movflags")
                .output_arg("+faststart"),
            VideoTarget::OGV => cmd
                .output_arg("-c:v")
                .output_arg("libtheora")
                .output_arg("-pix_fmt")
                .output_arg("yuv420p")
                .output_arg("-qscale:v")
                .output_arg("7")
                .output_arg("-an"),
        }
    }

    /// Builds the command for encoding a PNG frame sequence at 10 fps
    /// (the motion-image path). `frame_glob` is a printf-style pattern,
    /// e.g. `frame-%04d.png`.
    pub fn for_frame_sequence(frame_glob: impl AsRef<Path>, output: impl AsRef<Path>, target: VideoTarget) -> Self {
        Self::for_video_target(frame_glob, output, target).with_input_framerate(10)
    }

    fn with_input_framerate(mut self, fps: u32) -> Self {
        self.input_args.push("-framerate".to_string());
        self.input_args.push(fps.to_string());
        self
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runs ffmpeg commands with optional timeout and cooperative cancellation.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!(args = %args.join(" "), "running ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stdout/stderr concurrently with wait() so ffmpeg never
        // blocks on a full pipe buffer.
        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");
        let drain_handle = tokio::spawn(async move {
            let mut out_lines = BufReader::new(stdout).lines();
            let mut err_lines = BufReader::new(stderr).lines();
            loop {
                tokio::select! {
                    line = out_lines.next_line() => if matches!(line, Ok(None) | Err(_)) { break },
                    line = err_lines.next_line() => if matches!(line, Ok(None) | Err(_)) { break },
                }
            }
        });

        let result = self.wait_for_completion(&mut child).await;
        let _ = drain_handle.await;
        result
    }

    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let wait_future = child.wait();

        let status = if let Some(timeout_secs) = self.timeout_secs {
            match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), wait_future).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_secs, "ffmpeg timed out, killing process");
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(timeout_secs));
                }
            }
        } else {
            wait_future.await?
        };

        if let Some(ref cancel_rx) = self.cancel_rx {
            if *cancel_rx.borrow() {
                info!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
        }

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::encode_failed("ffmpeg exited with a non-zero status", status.code()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_target_builds_expected_flags() {
        let cmd = FfmpegCommand::for_video_target("in.mp4", "out.mp4", VideoTarget::MP4);
        let args = cmd.build_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"28".to_string()));
        assert!(args.contains(&"veryfast".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"scale=512:-1:flags=lanczos".to_string()));
    }

    #[test]
    fn ogv_target_builds_expected_flags() {
        let cmd = FfmpegCommand::for_video_target("in.mp4", "out.ogv", VideoTarget::OGV);
        let args = cmd.build_args();
        assert!(args.contains(&"libtheora".to_string()));
        assert!(args.contains(&"7".to_string()));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn frame_sequence_sets_input_framerate() {
        let cmd = FfmpegCommand::for_frame_sequence("frame-%04d.png", "out.mp4", VideoTarget::MP4);
        let args = cmd.build_args();
        let idx = args.iter().position(|a| a == "-framerate").unwrap();
        assert_eq!(args[idx + 1], "10");
    }
}
