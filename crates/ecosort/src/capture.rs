//! Camera frame capture and still-image encoding.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, RgbImage};

use crate::types::{EcoError, EcoResult};

/// JPEG quality for uploaded stills.
pub const STILL_QUALITY: u8 = 80;

/// MIME type of every encoded still.
pub const STILL_MIME: &str = "image/jpeg";

/// A raw RGB frame at the source's current pixel dimensions.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl VideoFrame {
    pub fn from_image(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            rgb: img.to_rgb8().into_raw(),
        }
    }

    /// A frame filled with a single color. Handy for tests and demos.
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        let rgb = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, rgb }
    }
}

/// A still image ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    /// Which frame this still was taken from.
    pub label: String,
}

/// Anything that yields live video frames.
pub trait FrameSource: Send {
    /// Grab the current frame. `Ok(None)` means no frame is ready yet.
    fn grab(&mut self) -> EcoResult<Option<VideoFrame>>;

    /// Stop all tracks. Further grabs return `Ok(None)`.
    fn stop(&mut self);

    fn is_live(&self) -> bool;

    /// Human-readable label for logs.
    fn label(&self) -> String {
        "camera".to_string()
    }

    /// Name of the frame last returned by [`FrameSource::grab`], for sources
    /// that show more than one picture.
    fn frame_label(&self) -> Option<String> {
        None
    }
}

/// The single live camera stream of a game.
///
/// Tracks are stopped on [`CameraSession::stop`] or when dropped.
pub struct CameraSession {
    source: Box<dyn FrameSource>,
}

impl CameraSession {
    /// Attach to a source. A source that is not live counts as denied access.
    pub fn attach(source: Box<dyn FrameSource>) -> EcoResult<Self> {
        if !source.is_live() {
            return Err(EcoError::Camera(format!(
                "{} is not available",
                source.label()
            )));
        }
        tracing::info!("Camera attached: {}", source.label());
        Ok(Self { source })
    }

    pub fn is_live(&self) -> bool {
        self.source.is_live()
    }

    pub fn label(&self) -> String {
        self.source.label()
    }

    /// Capture one still from the stream.
    pub fn capture(&mut self) -> EcoResult<Option<EncodedFrame>> {
        capture_still(self.source.as_mut())
    }

    pub fn stop(&mut self) {
        if self.source.is_live() {
            tracing::info!("Stopping camera tracks: {}", self.source.label());
            self.source.stop();
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Grab a frame and encode it as JPEG at the frame's own dimensions.
///
/// `Ok(None)` means "skip this tick": no frame was available, or the frame
/// was empty or malformed.
pub fn capture_still(source: &mut dyn FrameSource) -> EcoResult<Option<EncodedFrame>> {
    if !source.is_live() {
        return Ok(None);
    }
    let Some(frame) = source.grab()? else {
        return Ok(None);
    };
    if frame.width == 0 || frame.height == 0 {
        tracing::debug!("Skipping empty frame from {}", source.label());
        return Ok(None);
    }
    let (width, height) = (frame.width, frame.height);
    let Some(rgb) = RgbImage::from_raw(width, height, frame.rgb) else {
        tracing::debug!("Skipping malformed {width}x{height} frame from {}", source.label());
        return Ok(None);
    };

    let bytes = encode_jpeg(&rgb)?;
    Ok(Some(EncodedFrame {
        bytes,
        width,
        height,
        mime: STILL_MIME,
        label: source.frame_label().unwrap_or_else(|| source.label()),
    }))
}

fn encode_jpeg(rgb: &RgbImage) -> EcoResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, STILL_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Encode an image loaded from disk as an upload-ready still.
pub fn encode_image(img: &DynamicImage, label: &str) -> EcoResult<EncodedFrame> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(EcoError::Capture("Image has no pixels".to_string()));
    }
    Ok(EncodedFrame {
        bytes: encode_jpeg(&rgb)?,
        width,
        height,
        mime: STILL_MIME,
        label: label.to_string(),
    })
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}

/// A camera backed by a directory of image files, cycled in name order.
pub struct DirectoryCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    shown: Option<usize>,
}

impl DirectoryCamera {
    /// Open a directory. Fails if it cannot be read or holds no images.
    pub fn open(dir: &Path) -> EcoResult<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_supported_format(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(EcoError::Camera(format!(
                "No images found in {}",
                dir.display()
            )));
        }

        tracing::debug!("Directory camera {} has {} frames", dir.display(), files.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            shown: None,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }
}

impl FrameSource for DirectoryCamera {
    fn grab(&mut self) -> EcoResult<Option<VideoFrame>> {
        if self.files.is_empty() {
            return Ok(None);
        }
        let index = self.cursor % self.files.len();
        let path = &self.files[index];
        self.cursor = self.cursor.wrapping_add(1);
        self.shown = Some(index);
        match image::open(path) {
            Ok(img) => Ok(Some(VideoFrame::from_image(&img))),
            Err(e) => {
                tracing::warn!("Unreadable frame {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn stop(&mut self) {
        self.files.clear();
    }

    fn is_live(&self) -> bool {
        !self.files.is_empty()
    }

    fn label(&self) -> String {
        format!("directory camera {}", self.dir.display())
    }

    fn frame_label(&self) -> Option<String> {
        let path = self.files.get(self.shown?)?;
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }
}

/// A camera that always shows the same picture.
pub struct StillCamera {
    frame: Option<VideoFrame>,
}

impl StillCamera {
    pub fn new(frame: VideoFrame) -> Self {
        Self { frame: Some(frame) }
    }

    pub fn from_file(path: &Path) -> EcoResult<Self> {
        let img = image::open(path)?;
        Ok(Self::new(VideoFrame::from_image(&img)))
    }
}

impl FrameSource for StillCamera {
    fn grab(&mut self) -> EcoResult<Option<VideoFrame>> {
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.frame = None;
    }

    fn is_live(&self) -> bool {
        self.frame.is_some()
    }

    fn label(&self) -> String {
        "still camera".to_string()
    }
}
