//! Wrappers around the external `ffmpeg`/`ffprobe` binaries.
//!
//! The transcode job only talks to the [`Encoder`] and [`Thumbnailer`]
//! traits, so the binaries can be swapped for fakes in tests.

pub mod encoder;
pub mod error;
pub mod ladder;
pub mod probe;
mod process;
pub mod thumbnail;

pub use encoder::{Encoder, FfmpegEncoder};
pub use error::{MediaError, MediaResult};
pub use ladder::Resolution;
pub use thumbnail::{FfmpegThumbnailer, Thumbnailer};

use std::path::Path;

/// File stem of the source upload, used to name every derived artifact.
pub fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// Media-root relative path of the encode of `stem` at `resolution`.
pub fn rendition_path(stem: &str, resolution: Resolution) -> String {
    let label = resolution.label();
    format!("videos/{label}/{stem}_{label}.mp4")
}

/// Media-root relative path of the thumbnail for `stem`.
pub fn thumbnail_path(stem: &str) -> String {
    format!("thumbnails/{stem}_thumb.jpg")
}
