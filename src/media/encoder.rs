use super::process::run;
use super::{rendition_path, source_stem, MediaResult, Resolution};
use crate::config::FfmpegConfig;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Produces one H.264/AAC encode of a source file.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encodes `source` at `resolution` and returns the media-root relative
    /// path of the produced file.
    async fn encode(&self, source: &Path, resolution: Resolution) -> MediaResult<String>;
}

/// [`Encoder`] that shells out to ffmpeg once per resolution.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    media_root: PathBuf,
    config: FfmpegConfig,
}

impl FfmpegEncoder {
    pub fn new(media_root: impl Into<PathBuf>, config: FfmpegConfig) -> Self {
        Self {
            media_root: media_root.into(),
            config,
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, source: &Path, resolution: Resolution) -> MediaResult<String> {
        let relative = rendition_path(&source_stem(source), resolution);
        let output = self.media_root.join(&relative);
        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let args = encode_args(source, &output, resolution, &self.config.preset);
        run(&self.config.ffmpeg_bin, &args, self.config.timeout).await?;

        Ok(relative)
    }
}

/// `-vf scale=-2:<h>` keeps the aspect ratio and rounds the width to an even
/// number, which libx264 requires.
pub(crate) fn encode_args(
    source: &Path,
    output: &Path,
    resolution: Resolution,
    preset: &str,
) -> Vec<OsString> {
    vec![
        "-i".into(),
        source.as_os_str().to_owned(),
        "-vf".into(),
        format!("scale=-2:{}", resolution.height()).into(),
        "-b:v".into(),
        resolution.bitrate().into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        preset.into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-y".into(),
        output.as_os_str().to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .and_then(|a| a.to_str())
    }

    #[test]
    fn args_carry_scale_bitrate_and_codecs() {
        let args = encode_args(
            Path::new("media/videos/clip.mp4"),
            Path::new("media/videos/720p/clip_720p.mp4"),
            Resolution::P720,
            "medium",
        );

        assert_eq!(arg_after(&args, "-i"), Some("media/videos/clip.mp4"));
        assert_eq!(arg_after(&args, "-vf"), Some("scale=-2:720"));
        assert_eq!(arg_after(&args, "-b:v"), Some("2500k"));
        assert_eq!(arg_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(arg_after(&args, "-c:a"), Some("aac"));
        assert_eq!(arg_after(&args, "-preset"), Some("medium"));
        assert!(args.iter().any(|a| a == "-y"));
        assert_eq!(
            args.last().and_then(|a| a.to_str()),
            Some("media/videos/720p/clip_720p.mp4")
        );
    }
}
