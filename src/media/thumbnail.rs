use super::probe::probe_duration;
use super::process::run;
use super::{source_stem, thumbnail_path, MediaResult};
use crate::config::FfmpegConfig;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Sources shorter than this do not get a thumbnail.
pub const MIN_THUMBNAIL_DURATION_SECS: f64 = 2.0;
/// Offset of the captured frame.
pub const THUMBNAIL_OFFSET: &str = "00:00:01";
pub const THUMBNAIL_WIDTH: u32 = 320;

/// Grabs a single still frame from a source file.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    /// Returns the media-root relative path of the thumbnail, or `None` when
    /// the source is too short to have a usable frame.
    async fn extract(&self, source: &Path) -> MediaResult<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    media_root: PathBuf,
    config: FfmpegConfig,
}

impl FfmpegThumbnailer {
    pub fn new(media_root: impl Into<PathBuf>, config: FfmpegConfig) -> Self {
        Self {
            media_root: media_root.into(),
            config,
        }
    }
}

#[async_trait]
impl Thumbnailer for FfmpegThumbnailer {
    async fn extract(&self, source: &Path) -> MediaResult<Option<String>> {
        let duration =
            probe_duration(&self.config.ffprobe_bin, source, self.config.timeout).await?;
        if duration < MIN_THUMBNAIL_DURATION_SECS {
            tracing::info!(
                source = %source.display(),
                duration,
                "source too short for a thumbnail, skipping"
            );
            return Ok(None);
        }

        let relative = thumbnail_path(&source_stem(source));
        let output = self.media_root.join(&relative);
        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        run(
            &self.config.ffmpeg_bin,
            &thumbnail_args(source, &output),
            self.config.timeout,
        )
        .await?;

        Ok(Some(relative))
    }
}

pub(crate) fn thumbnail_args(source: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-ss".into(),
        THUMBNAIL_OFFSET.into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-vframes".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={THUMBNAIL_WIDTH}:-1").into(),
        "-y".into(),
        output.as_os_str().to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grabs_one_scaled_frame_one_second_in() {
        let args = thumbnail_args(
            Path::new("media/videos/clip.mp4"),
            Path::new("media/thumbnails/clip_thumb.jpg"),
        );
        let args: Vec<&str> = args.iter().filter_map(|a| a.to_str()).collect();

        assert_eq!(
            args,
            vec![
                "-ss",
                "00:00:01",
                "-i",
                "media/videos/clip.mp4",
                "-vframes",
                "1",
                "-vf",
                "scale=320:-1",
                "-y",
                "media/thumbnails/clip_thumb.jpg",
            ]
        );
    }
}
