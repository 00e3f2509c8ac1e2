//! Loaded image payload

use bytes::Bytes;
use mime::Mime;

/// Encoded image data as produced by a fetcher
///
/// The bytes are not decoded; consumers pick their own decoder based on
/// `content_type`. Cloning is cheap (`Bytes` is reference counted).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Bytes,
    content_type: Option<Mime>,
}

impl Image {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Guess an image content type from a file extension
pub fn mime_from_extension(extension: &str) -> Option<Mime> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "webp" => "image/webp".parse().ok()?,
        "avif" => "image/avif".parse().ok()?,
        "ico" => "image/x-icon".parse().ok()?,
        _ => return None,
    };
    Some(mime)
}
