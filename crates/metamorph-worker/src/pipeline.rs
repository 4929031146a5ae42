//! Per-job conversion pipeline: download -> detect -> convert -> store.
//! Implements the state machine `Dequeued -> Downloading -> Converted ->
//! Stored -> Done`, with any step able to fail and fall through to
//! `Failed` (logged, job abandoned).

use std::path::{Path, PathBuf};
use std::time::Instant;

use metamorph_cache::CacheEngine;
use metamorph_media::{Downloader, FfmpegCommand, FfmpegRunner};
use metamorph_models::{ConversionJob, MediaClass};
use tokio::sync::watch;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Size bucket label for the per-format duration histograms.
fn size_bucket(bytes: u64) -> &'static str {
    const MB: u64 = 1024 * 1024;
    match bytes {
        b if b < MB => "<1MB",
        b if b < 5 * MB => "1-5MB",
        b if b < 10 * MB => "5-10MB",
        _ => ">10MB",
    }
}

fn histogram_name(media_class: MediaClass) -> &'static str {
    match media_class {
        MediaClass::StaticImage => "dcl_metamorph_static_image_duration_seconds",
        MediaClass::MotionImage => "dcl_metamorph_motion_image_duration_seconds",
        MediaClass::MotionVideo | MediaClass::Other => "dcl_metamorph_motion_video_duration_seconds",
    }
}

/// Executes one conversion job end to end under `job_dir` (a scratch
/// directory unique to this job, already created by the caller). Deletes
/// every file it created on every exit path.
pub struct ConversionPipeline<'a> {
    downloader: &'a Downloader,
    cache: &'a CacheEngine,
}

impl<'a> ConversionPipeline<'a> {
    pub fn new(downloader: &'a Downloader, cache: &'a CacheEngine) -> Self {
        Self { downloader, cache }
    }

    pub async fn run(&self, job: &ConversionJob, job_dir: &Path, cancel: watch::Receiver<bool>) -> WorkerResult<()> {
        let started = Instant::now();

        let downloaded = self.downloader.download(&job.url, job_dir, job.hash.as_str()).await?;
        let source_size = tokio::fs::metadata(&downloaded.path).await.map(|m| m.len()).unwrap_or(0);

        let media_class = metamorph_media::detect(&downloaded.path).await?;

        let (output_path, format_name) = match media_class {
            MediaClass::StaticImage => {
                let output = self.convert_static_image(&downloaded.path, job_dir, job.image_target).await?;
                (output, job.image_target.name())
            }
            MediaClass::MotionImage => {
                let output = self
                    .convert_motion_image(&downloaded.path, job_dir, job.video_target, cancel.clone())
                    .await?;
                (output, job.video_target.name())
            }
            MediaClass::MotionVideo => {
                let output = self
                    .convert_motion_video(&downloaded.path, job_dir, job.video_target, cancel.clone())
                    .await?;
                (output, job.video_target.name())
            }
            MediaClass::Other => return Err(WorkerError::UnsupportedMediaClass(media_class.to_string())),
        };

        self.cache
            .store(
                &job.hash,
                format_name,
                media_class,
                downloaded.etag.as_deref(),
                downloaded.max_age,
                &output_path,
            )
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        let labels = [("size_bucket", size_bucket(source_size)), ("format", format_name)];
        metrics::histogram!(histogram_name(media_class), &labels).record(elapsed);

        info!(%job.hash, format_name, elapsed_secs = elapsed, "conversion stored");
        Ok(())
    }

    async fn convert_static_image(
        &self,
        input: &Path,
        job_dir: &Path,
        target: metamorph_models::ImageTarget,
    ) -> WorkerResult<PathBuf> {
        let preprocessed = job_dir.join("preprocessed.png");
        metamorph_media::preprocess_image(input, &preprocessed).await?;

        let output = job_dir.join("out.ktx2");
        metamorph_media::toktx::encode(&preprocessed, &output, target).await?;
        Ok(output)
    }

    async fn convert_motion_image(
        &self,
        input: &Path,
        job_dir: &Path,
        target: metamorph_models::VideoTarget,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<PathBuf> {
        let frames_dir = job_dir.join("frames");
        let frame_glob = metamorph_media::extract_frames(input, &frames_dir).await?;

        let output = job_dir.join(format!("out{}", target.extension()));
        let cmd = FfmpegCommand::for_frame_sequence(&frame_glob, &output, target);
        FfmpegRunner::new().with_cancel(cancel).run(&cmd).await?;

        metamorph_media::remove_dir_best_effort(&frames_dir).await;
        Ok(output)
    }

    async fn convert_motion_video(
        &self,
        input: &Path,
        job_dir: &Path,
        target: metamorph_models::VideoTarget,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<PathBuf> {
        let output = job_dir.join(format!("out{}", target.extension()));
        let cmd = FfmpegCommand::for_video_target(input, &output, target);
        FfmpegRunner::new().with_cancel(cancel).run(&cmd).await?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_buckets_match_spec_boundaries() {
        assert_eq!(size_bucket(100), "<1MB");
        assert_eq!(size_bucket(2 * 1024 * 1024), "1-5MB");
        assert_eq!(size_bucket(7 * 1024 * 1024), "5-10MB");
        assert_eq!(size_bucket(20 * 1024 * 1024), ">10MB");
    }
}
