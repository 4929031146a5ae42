//! The convert endpoint: composes the cache engine, conversion queue, and
//! waiter service into the single user-facing contract.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use metamorph_models::{ConversionHash, ConversionJob, ImageTarget, VideoTarget};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_image_target() -> ImageTarget {
    ImageTarget::UASTC
}

fn default_video_target() -> VideoTarget {
    VideoTarget::MP4
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub url: String,
    #[serde(rename = "imageFormat", default = "default_image_target")]
    pub image_format: ImageTarget,
    #[serde(rename = "videoFormat", default = "default_video_target")]
    pub video_format: VideoTarget,
    #[serde(default)]
    pub wait: bool,
    #[serde(rename = "forceRefresh", default)]
    pub force_refresh: bool,
}

/// `GET|HEAD /convert`. Redirects to a cached artifact, enqueues a
/// conversion on a miss, and optionally blocks for one to materialize.
pub async fn convert(State(state): State<AppState>, Query(query): Query<ConvertQuery>) -> ApiResult<Response> {
    let parsed = url::Url::parse(&query.url).map_err(|_| ApiError::bad_request("url must be a well-formed absolute URL"))?;
    if !parsed.scheme().starts_with("http") {
        return Err(ApiError::bad_request("url must use http or https"));
    }

    let hash = ConversionHash::of_url(&query.url);

    // This path must never raise a server error — cache and queue failures
    // degrade to a redirect to the original URL instead of propagating,
    // same as an honest cache miss would.
    let record = match state
        .cache
        .lookup(&hash, query.image_format, query.video_format, query.force_refresh, Some(&query.url))
        .await
    {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, url = %query.url, "cache lookup failed, degrading to redirect");
            None
        }
    };

    let record = match record {
        Some(record) => Some(record),
        None => {
            let job = ConversionJob::new(query.url.clone(), query.image_format, query.video_format);
            if let Err(e) = state.queue.enqueue(job).await {
                warn!(error = %e, url = %query.url, "enqueue failed, degrading to redirect");
            }

            if query.wait {
                state.waiter.wait(&hash, query.image_format, query.video_format).await
            } else {
                None
            }
        }
    };

    match record {
        Some(record) => Ok(found(&record.url)),
        None if query.wait => Ok(StatusCode::ACCEPTED.into_response()),
        None => Ok(found(&query.url)),
    }
}

/// `302 Found` with the given `Location`. Bypasses `axum::response::Redirect`,
/// whose constructors only build 303/307/308, since clients here need the
/// exact 302 status.
fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = header::HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}
