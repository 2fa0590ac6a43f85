use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// A decoded image payload, ready to be written under the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes a base64 image, either bare or as a `data:image/...;base64,` URI.
pub fn decode_image(encoded: &str) -> Result<ImageUpload, &'static str> {
    let encoded = encoded.trim();
    let data = match encoded.strip_prefix("data:") {
        Some(uri) => match uri.split_once(";base64,") {
            Some((mime, data)) if mime.starts_with("image/") => data,
            _ => return Err("Upload a valid image. Expected a base64 image data URI."),
        },
        None => encoded,
    };

    if data.is_empty() {
        return Err("No file was submitted.");
    }

    let bytes = STANDARD
        .decode(data)
        .map_err(|_| "Upload a valid image. The payload is not valid base64.")?;

    let extension = detect_extension(&bytes)
        .ok_or("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")?;

    Ok(ImageUpload { bytes, extension })
}

fn detect_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// Stores uploaded images as files and turns stored paths into public URLs.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url: &str) -> Self {
        let url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };

        Self {
            root: root.into(),
            url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image into `dir` and returns its path relative to the media root.
    pub async fn save(&self, dir: &str, image: &ImageUpload) -> Result<String, ApiError> {
        let relative = format!("{dir}/{}.{}", Uuid::new_v4().simple(), image.extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to create {parent:?}: {e}")))?;
        }

        tokio::fs::write(&target, &image.bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write {target:?}: {e}")))?;

        debug!("Stored image {relative} ({} bytes)", image.bytes.len());
        Ok(relative)
    }

    /// Removes a stored file. Failures are logged and otherwise ignored.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative.split('/').any(|part| part == "..") {
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            warn!("Failed to remove media file {relative}: {e}");
        }
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.url, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &str = "iVBORw0KGgo=";

    #[test]
    fn decodes_data_uri() {
        let image = decode_image(&format!("data:image/png;base64,{PNG}")).unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes.len(), 8);
    }

    #[test]
    fn decodes_bare_payload() {
        assert_eq!(decode_image(PNG).unwrap().extension, "png");
    }

    #[test]
    fn rejects_non_images() {
        let text = STANDARD.encode(b"just some text");

        assert!(decode_image(&text).is_err());
        assert!(decode_image("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_image("not base64 at all!").is_err());
        assert!(decode_image("").is_err());
    }

    #[test]
    fn detects_common_formats() {
        assert_eq!(detect_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(detect_extension(b"GIF89a....."), Some("gif"));
        assert_eq!(detect_extension(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(detect_extension(b"BM"), None);
    }

    #[test]
    fn urls_are_joined_onto_media_url() {
        let media = MediaStore::new("media", "/media");
        assert_eq!(
            media.url("recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
    }

    #[tokio::test]
    async fn saves_and_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path(), "/media/");
        let image = decode_image(PNG).unwrap();

        let path = media.save("users/avatars", &image).await.unwrap();
        assert!(path.starts_with("users/avatars/"));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(&path)).unwrap(), image.bytes);

        media.remove(&path).await;
        assert!(!dir.path().join(&path).exists());
    }
}
