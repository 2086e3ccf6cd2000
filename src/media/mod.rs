//! Media download utilities.
//!
//! Platform detection plus yt-dlp based video download into a caller-owned
//! transient directory.

mod download;
mod platform;

pub use download::{mime_type_for, VideoDownloader, YtDlpDownloader};
pub use platform::SourcePlatform;
