use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    rc::Rc,
};

use image::{
    Delay, Frame, RgbImage,
    codecs::gif::{GifEncoder, Repeat},
};

use crate::error::{GanvizError, GanvizResult};

/// Supported animation container formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    Gif,
    Mp4,
}

impl OutputFormat {
    /// Parse a format string; anything but `gif`/`mp4` is rejected.
    pub fn parse(s: &str) -> GanvizResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "mp4" => Ok(Self::Mp4),
            other => Err(GanvizError::unsupported_format(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
        }
    }

    /// Append the format extension when the path does not carry it.
    pub fn ensure_extension(self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(self.extension()))
        {
            path.to_path_buf()
        } else {
            let mut s = path.as_os_str().to_os_string();
            s.push(".");
            s.push(self.extension());
            PathBuf::from(s)
        }
    }
}

/// The injected video backend: receives rendered frames, persists a
/// clip. Exactly one `finish` call ends the stream.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> GanvizResult<()>;
    fn finish(&mut self) -> GanvizResult<()>;
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> GanvizResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GanvizError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(GanvizError::validation("encode fps must be non-zero"));
        }
        Ok(())
    }
}

pub fn ensure_parent_dir(path: &Path) -> GanvizResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Shared in-memory writer for the GIF encoder; infallible, so every
/// filesystem error is deferred to the single write in `finish`.
#[derive(Clone, Default)]
struct GifBuffer(Rc<RefCell<Vec<u8>>>);

impl std::io::Write for GifBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Frame-rate-preserving GIF writer built on the `image` codec.
///
/// Frames are encoded into memory; the output file is written in one
/// shot by `finish`, so trailer and disk errors surface there.
pub struct GifSink {
    encoder: Option<GifEncoder<GifBuffer>>,
    buf: GifBuffer,
    cfg: EncodeConfig,
}

impl GifSink {
    pub fn create(cfg: EncodeConfig) -> GanvizResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(GanvizError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        let buf = GifBuffer::default();
        let mut encoder = GifEncoder::new(buf.clone());
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| GanvizError::encode(format!("failed to set gif repeat: {e}")))?;
        Ok(Self {
            encoder: Some(encoder),
            buf,
            cfg,
        })
    }
}

impl VideoSink for GifSink {
    fn write_frame(&mut self, frame: &RgbImage) -> GanvizResult<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(GanvizError::shape_mismatch(format!(
                "frame size {}x{} does not match configured {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(GanvizError::encode("gif sink is already finalized"));
        };
        let rgba = image::DynamicImage::ImageRgb8(frame.clone()).into_rgba8();
        let delay = Delay::from_numer_denom_ms(1000, self.cfg.fps);
        encoder
            .encode_frame(Frame::from_parts(rgba, 0, 0, delay))
            .map_err(|e| GanvizError::encode(format!("failed to encode gif frame: {e}")))
    }

    fn finish(&mut self) -> GanvizResult<()> {
        let Some(encoder) = self.encoder.take() else {
            return Err(GanvizError::encode("gif sink is already finalized"));
        };
        // The encoder writes the trailer into the buffer on drop.
        drop(encoder);
        let bytes = std::mem::take(&mut *self.buf.0.borrow_mut());
        std::fs::write(&self.cfg.out_path, &bytes).map_err(|e| {
            GanvizError::encode(format!(
                "failed to write '{}': {e}",
                self.cfg.out_path.display()
            ))
        })
    }
}

/// MP4 writer piping raw rgb24 frames into a system `ffmpeg` process.
///
/// The system binary keeps the crate free of native FFmpeg dev
/// headers; encoding targets libx264/yuv420p for broad playback
/// compatibility, which requires even frame dimensions.
pub struct FfmpegSink {
    cfg: EncodeConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn create(cfg: EncodeConfig) -> GanvizResult<Self> {
        cfg.validate()?;
        if cfg.width % 2 != 0 || cfg.height % 2 != 0 {
            return Err(GanvizError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(GanvizError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(GanvizError::encode(
                "ffmpeg is required for MP4 export, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            GanvizError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GanvizError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            cfg,
            child: Some(child),
            stdin: Some(stdin),
        })
    }
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> GanvizResult<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(GanvizError::shape_mismatch(format!(
                "frame size {}x{} does not match configured {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(GanvizError::encode("ffmpeg sink is already finalized"));
        };
        use std::io::Write as _;
        stdin.write_all(frame.as_raw()).map_err(|e| {
            GanvizError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    fn finish(&mut self) -> GanvizResult<()> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Err(GanvizError::encode("ffmpeg sink is already finalized"));
        };
        let output = child
            .wait_with_output()
            .map_err(|e| GanvizError::encode(format!("failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GanvizError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Open the sink matching `format` at `path` (extension auto-appended).
pub fn open_sink(
    path: impl AsRef<Path>,
    format: OutputFormat,
    width: u32,
    height: u32,
    fps: u32,
) -> GanvizResult<(Box<dyn VideoSink>, PathBuf)> {
    let out_path = format.ensure_extension(path);
    let cfg = EncodeConfig {
        width,
        height,
        fps,
        out_path: out_path.clone(),
        overwrite: true,
    };
    let sink: Box<dyn VideoSink> = match format {
        OutputFormat::Gif => Box::new(GifSink::create(cfg)?),
        OutputFormat::Mp4 => Box::new(FfmpegSink::create(cfg)?),
    };
    Ok((sink, out_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_formats_case_insensitively() {
        assert_eq!(OutputFormat::parse("gif").unwrap(), OutputFormat::Gif);
        assert_eq!(OutputFormat::parse("MP4").unwrap(), OutputFormat::Mp4);
    }

    #[test]
    fn parse_rejects_unknown_format() {
        assert!(matches!(
            OutputFormat::parse("webm"),
            Err(GanvizError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            OutputFormat::parse("ipython_display"),
            Err(GanvizError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn ensure_extension_appends_when_missing() {
        assert_eq!(
            OutputFormat::Gif.ensure_extension("clip"),
            PathBuf::from("clip.gif")
        );
        assert_eq!(
            OutputFormat::Mp4.ensure_extension("out/clip"),
            PathBuf::from("out/clip.mp4")
        );
    }

    #[test]
    fn ensure_extension_keeps_existing_suffix() {
        assert_eq!(
            OutputFormat::Gif.ensure_extension("clip.gif"),
            PathBuf::from("clip.gif")
        );
        // A foreign extension is not stripped, only supplemented.
        assert_eq!(
            OutputFormat::Gif.ensure_extension("clip.v2"),
            PathBuf::from("clip.v2.gif")
        );
    }

    #[test]
    fn config_validation_catches_bad_values() {
        let cfg = EncodeConfig {
            width: 0,
            height: 10,
            fps: 16,
            out_path: PathBuf::from("target/out.gif"),
            overwrite: true,
        };
        assert!(cfg.validate().is_err());

        let cfg = EncodeConfig {
            width: 10,
            height: 10,
            fps: 0,
            out_path: PathBuf::from("target/out.gif"),
            overwrite: true,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gif_finish_surfaces_write_errors() {
        // A directory at the output path makes the final write fail.
        let dir = PathBuf::from("target").join("ganviz_tests").join("dir.gif");
        std::fs::create_dir_all(&dir).unwrap();
        let cfg = EncodeConfig {
            width: 4,
            height: 4,
            fps: 8,
            out_path: dir,
            overwrite: true,
        };
        let mut sink = GifSink::create(cfg).unwrap();
        sink.write_frame(&RgbImage::new(4, 4)).unwrap();
        assert!(matches!(sink.finish(), Err(GanvizError::Encode(_))));
    }

    #[test]
    fn ffmpeg_sink_requires_even_dimensions() {
        let cfg = EncodeConfig {
            width: 11,
            height: 10,
            fps: 16,
            out_path: PathBuf::from("target/out.mp4"),
            overwrite: true,
        };
        assert!(matches!(
            FfmpegSink::create(cfg),
            Err(GanvizError::Validation(_))
        ));
    }
}
