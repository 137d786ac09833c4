use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::core::error::ChatError;
use crate::core::message::ImageRef;

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image waiting to be sent with the next message.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub name: String,
    pub media_type: String,
    /// Base64 payload.
    pub data: String,
}

impl ImageAttachment {
    pub fn from_path(path: &Path) -> Result<Self, ChatError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        // Check the type before reading a potentially large file.
        media_type_for(&name)?;
        let bytes = std::fs::read(path)
            .map_err(|e| ChatError::Validation(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_bytes(name, &bytes)
    }

    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, ChatError> {
        let name = name.into();
        let media_type = media_type_for(&name)?;
        if bytes.is_empty() {
            return Err(ChatError::Validation(format!("{name} is empty")));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ChatError::Validation(
                "File too large. Max size: 10MB".into(),
            ));
        }
        Ok(Self {
            name,
            media_type: media_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }

    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
        }
    }
}

fn media_type_for(name: &str) -> Result<&'static str, ChatError> {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(ChatError::Validation(
            "Invalid file type. Allowed: image/jpeg, image/png, image/gif, image/webp".into(),
        )),
    }
}
