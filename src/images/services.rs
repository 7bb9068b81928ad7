use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image must not be empty.")]
    Empty,
    #[error("Image must be a base64 data URI.")]
    InvalidDataUri,
    #[error("Unsupported image type: {0}.")]
    UnsupportedType(String),
    #[error("Image is not valid base64.")]
    InvalidBase64,
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        ApiError::validation(e.to_string())
    }
}

/// Image payload decoded from a JSON request.
#[derive(Debug)]
pub struct DecodedImage {
    pub body: Bytes,
    pub content_type: &'static str,
    pub ext: &'static str,
}

fn ext_from_mime(ct: &str) -> Option<(&'static str, &'static str)> {
    match ct {
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/png" => Some(("image/png", "png")),
        "image/webp" => Some(("image/webp", "webp")),
        "image/gif" => Some(("image/gif", "gif")),
        _ => None,
    }
}

/// Decode `data:image/<type>;base64,<payload>`. A bare base64 payload is
/// accepted as JPEG.
pub fn decode_data_uri(raw: &str) -> Result<DecodedImage, ImageError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ImageError::Empty);
    }

    let (mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUri)?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or(ImageError::InvalidDataUri)?;
            (mime.to_ascii_lowercase(), payload)
        }
        None => ("image/jpeg".to_string(), raw),
    };

    let (content_type, ext) =
        ext_from_mime(&mime).ok_or_else(|| ImageError::UnsupportedType(mime.clone()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    Ok(DecodedImage {
        body: Bytes::from(bytes),
        content_type,
        ext,
    })
}

/// Upload under `<prefix>/<uuid>.<ext>` and return the storage key.
pub async fn upload_image(
    st: &AppState,
    prefix: &str,
    image: &DecodedImage,
) -> anyhow::Result<String> {
    let key = format!("{}/{}.{}", prefix, Uuid::new_v4(), image.ext);
    st.storage
        .put_object(&key, image.body.clone(), image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

pub async fn media_url(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, st.config.storage.url_ttl_secs)
        .await
        .with_context(|| format!("presign url for {}", key))
}

pub async fn optional_media_url(st: &AppState, key: Option<&str>) -> anyhow::Result<Option<String>> {
    match key {
        Some(k) => Ok(Some(media_url(st, k).await?)),
        None => Ok(None),
    }
}

/// Best-effort removal of an object that is no longer referenced.
pub async fn discard(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to delete stale media object");
    }
}
