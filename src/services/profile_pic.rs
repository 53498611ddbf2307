use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Public URL prefix stored in `users.profile_pic`.
pub const PUBLIC_PREFIX: &str = "/static/profile_pics/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid image data")]
    InvalidImageData,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Writes profile pictures into a directory and hands back their public path.
#[derive(Debug, Clone)]
pub struct ProfilePicStore {
    dir: PathBuf,
}

impl ProfilePicStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store an image decoded by [`decode_data_url`] as
    /// `profile_<user_id>_<8 hex>.<ext>`.
    pub async fn save_decoded(
        &self,
        image: &DecodedImage,
        user_id: i64,
    ) -> Result<String, StorageError> {
        let token = Uuid::new_v4().simple().to_string();
        let filename = format!("profile_{}_{}.{}", user_id, &token[..8], image.extension);
        self.write(&filename, &image.bytes).await
    }

    /// Store a multipart upload as `<32 hex>_<sanitized original name>`.
    pub async fn save_upload(
        &self,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let filename = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(original_filename)
        );
        self.write(&filename, bytes).await
    }

    /// Remove a previously stored picture. Paths outside the public prefix
    /// are ignored. Returns whether a file was removed.
    pub async fn delete(&self, public_path: &str) -> bool {
        let Some(filename) = public_path.strip_prefix(PUBLIC_PREFIX) else {
            return false;
        };
        if filename.is_empty() || filename.contains('/') || filename.contains("..") {
            return false;
        }

        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => {
                debug!("Removed profile picture {}", filename);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove profile picture {}: {}", filename, e);
                false
            }
        }
    }

    async fn write(&self, filename: &str, bytes: &[u8]) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(filename), bytes).await?;
        debug!("Stored profile picture {} ({} bytes)", filename, bytes.len());
        Ok(format!("{}{}", PUBLIC_PREFIX, filename))
    }
}

/// Image bytes decoded from a data URL, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:")
}

pub fn decode_data_url(data: &str) -> Result<DecodedImage, StorageError> {
    let (extension, payload) = split_data_url(data);
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| StorageError::InvalidImageData)?;
    if bytes.is_empty() {
        return Err(StorageError::InvalidImageData);
    }
    Ok(DecodedImage { extension, bytes })
}

fn split_data_url(data: &str) -> (String, &str) {
    match data.split_once(',') {
        Some((header, payload)) => {
            let extension = header
                .split_once("image/")
                .map(|(_, rest)| rest.split(';').next().unwrap_or_default())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .unwrap_or("jpg");
            (extension.to_ascii_lowercase(), payload)
        }
        None => ("jpg".to_string(), data),
    }
}

fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
