use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("download exceeded the byte cap ({0} bytes)")]
    DownloadTooLarge(u64),

    #[error("could not classify file as a known media type")]
    UnknownFileType,

    #[error("encoder exited with a non-zero status: {message} (exit code {code:?})")]
    EncodeFailed { message: String, code: Option<i32> },

    #[error("ffmpeg not found on PATH")]
    FfmpegNotFound,

    #[error("toktx not found on PATH")]
    ToktxNotFound,

    #[error("operation cancelled")]
    Cancelled,

    #[error("subprocess timed out after {0}s")]
    Timeout(u64),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn encode_failed(message: impl Into<String>, code: Option<i32>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
            code,
        }
    }
}
