//! Shared types for the MetaMorph media conversion pipeline: conversion
//! identity, media classification, target format enums, cache key
//! derivation, and the work-queue job shape.

pub mod identity;
pub mod image_target;
pub mod job;
pub mod keys;
pub mod media_class;
pub mod video_target;

pub use identity::{ConversionHash, ConversionIdentity};
pub use image_target::ImageTarget;
pub use job::{ConversionJob, RefreshRequest};
pub use keys::{in_flight_key, CacheKeys, CACHE_KEY_VERSION, IN_FLIGHT_TTL_SECS};
pub use media_class::MediaClass;
pub use video_target::VideoTarget;
