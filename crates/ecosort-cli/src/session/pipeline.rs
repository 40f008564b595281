//! One analysis attempt: capture → upload → classify.

use std::sync::{Arc, Mutex, Weak};

use ecosort::{CameraSession, Classified, Classifier, EcoResult, EncodedFrame, Uploader};

/// The capture/upload/classify sequence for one owner.
#[derive(Clone)]
pub struct Pipeline {
    uploader: Uploader,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(uploader: Uploader, classifier: Classifier) -> Self {
        Self {
            uploader,
            classifier,
        }
    }

    /// Capture one still from the live camera.
    ///
    /// Decoding and JPEG encoding run on the blocking pool. `None` means the
    /// tick is skipped: the camera is gone, had no frame, or failed to grab.
    pub async fn capture(&self, camera: &Weak<Mutex<CameraSession>>) -> Option<EncodedFrame> {
        let camera = camera.clone();
        match tokio::task::spawn_blocking(move || grab_still(&camera)).await {
            Ok(still) => still,
            Err(e) => {
                tracing::warn!("Capture task failed: {e}");
                None
            }
        }
    }

    /// Upload an already-encoded still and classify it.
    ///
    /// Upload failures are returned; classifier failures never are.
    pub async fn analyze_frame(&self, frame: &EncodedFrame) -> EcoResult<Classified> {
        let url = self.uploader.upload(frame).await?;
        tracing::debug!("Still {} uploaded to {url}", frame.label);
        Ok(self.classifier.classify(&url).await)
    }
}

/// Grab and encode one still without extending the camera's lifetime.
fn grab_still(camera: &Weak<Mutex<CameraSession>>) -> Option<EncodedFrame> {
    let camera: Arc<Mutex<CameraSession>> = camera.upgrade()?;
    let mut session = camera.lock().unwrap_or_else(|e| e.into_inner());
    match session.capture() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("Skipping tick, capture failed: {e}");
            None
        }
    }
}
