use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::ConversionHash;
use crate::image_target::ImageTarget;
use crate::video_target::VideoTarget;

/// (De)serializes an [`ImageTarget`] as the integer code used on the
/// work-queue wire format, rather than the variant-name string `ImageTarget`
/// otherwise uses for query-parameter parsing.
mod image_target_code {
    use super::*;

    pub fn serialize<S: Serializer>(target: &ImageTarget, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(target.as_code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ImageTarget, D::Error> {
        let code = u8::deserialize(deserializer)?;
        ImageTarget::from_code(code).ok_or_else(|| serde::de::Error::custom(format!("unrecognized ImageFormat code: {code}")))
    }
}

/// Same as [`image_target_code`], for [`VideoTarget`].
mod video_target_code {
    use super::*;

    pub fn serialize<S: Serializer>(target: &VideoTarget, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(target.as_code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VideoTarget, D::Error> {
        let code = u8::deserialize(deserializer)?;
        VideoTarget::from_code(code).ok_or_else(|| serde::de::Error::custom(format!("unrecognized VideoFormat code: {code}")))
    }
}

/// A work-queue message: one conversion to perform.
///
/// Field names match the wire shape a remote queue backend stores; keep
/// them stable, existing in-flight messages depend on this layout.
/// `ImageFormat`/`VideoFormat` are the integer codes (`UASTC=0, ASTC=1,
/// ASTC_HIGH=2` / `MP4=0, OGV=1`), not the variant names `ConvertQuery`'s
/// query-string parsing uses for the same enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    #[serde(rename = "Hash")]
    pub hash: ConversionHash,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "ImageFormat", with = "image_target_code")]
    pub image_target: ImageTarget,
    #[serde(rename = "VideoFormat", with = "video_target_code")]
    pub video_target: VideoTarget,
}

impl ConversionJob {
    pub fn new(url: impl Into<String>, image_target: ImageTarget, video_target: VideoTarget) -> Self {
        let url = url.into();
        Self {
            hash: ConversionHash::of_url(&url),
            url,
            image_target,
            video_target,
        }
    }
}

/// A request to the refresh pipeline: revalidate a cached conversion and,
/// if stale, re-enqueue it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshRequest {
    pub hash: ConversionHash,
    pub url: String,
    pub image_target: ImageTarget,
    pub video_target: VideoTarget,
    /// Bypass the freshness marker and revalidate unconditionally.
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_round_trips_through_json_with_wire_field_names() {
        let job = ConversionJob::new("https://example.com/a.png", ImageTarget::ASTC, VideoTarget::OGV);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"Hash\""));
        assert!(json.contains("\"URL\""));
        assert!(json.contains("\"ImageFormat\""));
        assert!(json.contains("\"VideoFormat\""));

        let round_tripped: ConversionJob = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped, job);
    }

    #[test]
    fn image_and_video_format_serialize_as_spec_integer_codes() {
        let job = ConversionJob::new("https://example.com/a.png", ImageTarget::AstcHigh, VideoTarget::OGV);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"ImageFormat\":2"), "{json}");
        assert!(json.contains("\"VideoFormat\":1"), "{json}");
    }

    #[test]
    fn deserializes_the_exact_wire_shape_from_spec_section_6() {
        let wire = r#"{"Hash":"abc123","URL":"https://example.com/a.png","ImageFormat":0,"VideoFormat":0}"#;
        let job: ConversionJob = serde_json::from_str(wire).unwrap();
        assert_eq!(job.image_target, ImageTarget::UASTC);
        assert_eq!(job.video_target, VideoTarget::MP4);
    }

    #[test]
    fn unrecognized_format_code_fails_to_deserialize() {
        let wire = r#"{"Hash":"abc123","URL":"https://example.com/a.png","ImageFormat":9,"VideoFormat":0}"#;
        assert!(serde_json::from_str::<ConversionJob>(wire).is_err());
    }
}
