//! EcoSort — core library for camera capture, upload, recycle/trash classification, and scoring.

pub mod achievements;
pub mod capture;
pub mod classify;
pub mod scoring;
pub mod types;
pub mod upload;

pub use achievements::default_achievements;
pub use capture::{
    capture_still, encode_image, CameraSession, DirectoryCamera, EncodedFrame, FrameSource,
    StillCamera, VideoFrame,
};
pub use classify::{
    decode_analysis, strip_code_fences, Classified, Classifier, DecodeError, FallbackReason,
    VisionModel, VisionRequest, CLASSIFY_PROMPT,
};
pub use scoring::{score_answer, Scored};
pub use types::*;
pub use upload::{validate_https, ObjectStore, Uploader};
