//! Media-tool collaborator: downloading source files, sniffing their
//! media type, and the image/video encode steps (image resize + `toktx`,
//! animated-frame extraction, and `ffmpeg` encode).

pub mod detect;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod frames;
pub mod fs_utils;
pub mod image_prep;
pub mod toktx;

pub use detect::{classify, detect};
pub use download::{DownloadedFile, Downloader, DEFAULT_MAX_DOWNLOAD_BYTES};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegCommand, FfmpegRunner};
pub use frames::extract_frames;
pub use fs_utils::{move_file, remove_dir_best_effort};
pub use image_prep::preprocess as preprocess_image;
