use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad shape of a piece of source media, as determined by sniffing
/// its leading bytes. Drives which conversion pipeline a job takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaClass {
    /// A single-frame image (PNG, JPEG, static WebP, SVG, ...).
    StaticImage,
    /// A short looping image sequence (animated GIF, animated WebP).
    MotionImage,
    /// A video file with an audio/video container.
    MotionVideo,
    /// Recognized as media but not one of the above (rare; treated as an
    /// encode failure upstream).
    Other,
}

impl MediaClass {
    /// The tag stored under the `filetype:{hash}_{v}` KV key. `MotionImage`
    /// is encoded as a video (its pipeline runs frames through the video
    /// encoder and stores under the video target's format name), so it
    /// groups with `MotionVideo` rather than `StaticImage` here.
    pub fn as_tag(self) -> &'static str {
        match self {
            MediaClass::StaticImage | MediaClass::Other => "Image",
            MediaClass::MotionImage | MediaClass::MotionVideo => "Video",
        }
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaClass::StaticImage => "StaticImage",
            MediaClass::MotionImage => "MotionImage",
            MediaClass::MotionVideo => "MotionVideo",
            MediaClass::Other => "Other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_groups_motion_images_with_video() {
        assert_eq!(MediaClass::StaticImage.as_tag(), "Image");
        assert_eq!(MediaClass::MotionImage.as_tag(), "Video");
        assert_eq!(MediaClass::MotionVideo.as_tag(), "Video");
    }
}
