use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

#[derive(Clone, Debug, PartialEq)]
pub struct EncodeSettings {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

impl EncodeSettings {
    /// Full ffmpeg argument list: raw RGBA frames on stdin, optional audio muxed in.
    pub fn args(&self, audio: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgba",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push("-video_size".into());
        args.push(format!("{}x{}", self.width, self.height).into());
        args.push("-framerate".into());
        args.push(self.fps.to_string().into());
        args.push("-i".into());
        args.push("pipe:0".into());

        if let Some(audio) = audio {
            args.push("-i".into());
            args.push(audio.as_os_str().to_owned());
        }

        args.push("-c:v".into());
        args.push(self.codec.clone().into());
        args.push("-pix_fmt".into());
        args.push(self.pix_fmt.clone().into());

        match &self.bitrate {
            Some(br) => {
                args.push("-b:v".into());
                args.push(br.into());
            }
            None => {
                args.push("-crf".into());
                args.push(self.crf.to_string().into());
                args.push("-preset".into());
                args.push("medium".into());
            }
        }

        if audio.is_some() {
            for a in ["-c:a", "aac", "-b:a", "192k", "-shortest"] {
                args.push(a.into());
            }
        }

        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// A running ffmpeg process fed raw frames on stdin.
///
/// Dropping an encoder without calling `finish` kills and reaps the process.
pub struct FfmpegEncoder {
    child: Option<Child>,
}

impl FfmpegEncoder {
    pub fn new(settings: &EncodeSettings, audio: Option<&Path>) -> Result<Self> {
        let mut command = Command::new("ffmpeg");
        command.args(settings.args(audio));
        let encoder = Self::spawn(command).context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec
        );

        Ok(encoder)
    }

    fn spawn(mut command: Command) -> std::io::Result<Self> {
        let child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Self { child: Some(child) })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self
            .child
            .as_mut()
            .and_then(|child| child.stdin.as_mut())
            .context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let mut child = self.child.take().context("FFmpeg already finished")?;
        // EOF on stdin ends the stream
        drop(child.stdin.take());

        let output = child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::warn!("Encoding aborted, stopping ffmpeg");
            if let Err(err) = child.kill() {
                log::debug!("ffmpeg already exited: {}", err);
            }
            if let Err(err) = child.wait() {
                log::warn!("Failed to reap ffmpeg: {}", err);
            }
        }
    }
}
