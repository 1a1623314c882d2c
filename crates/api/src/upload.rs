// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::Path;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use slugify::slugify;

use crate::api::error::ApiError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf"];
/// Cap on the decoded file size.
pub const MAX_FILE_BYTES: usize = 16 * 1024 * 1024;

/// Inline file payload as carried in JSON request bodies.
#[derive(Deserialize, Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub content_base64: String,
}

fn file_extension(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collision-free stored name: timestamp prefix plus a slug of the original
/// stem, keeping the (lowercased) extension.
pub fn unique_name(original: &str, now: DateTime<Utc>) -> String {
    let (stem, ext) = original
        .rsplit_once('.')
        .unwrap_or((original, "bin"));
    let mut slug = slugify!(stem);
    if slug.is_empty() {
        slug = "file".to_string();
    }
    format!(
        "{}_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        slug,
        ext.to_ascii_lowercase()
    )
}

/// Reject anything that could escape the upload directory.
pub fn sanitize_filename(name: &str) -> Option<&str> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        None
    } else {
        Some(name)
    }
}

pub fn content_type_for(filename: &str) -> &'static str {
    match file_extension(filename)
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    }
}

/// Decode and persist an inline payload, returning the relative path stored
/// on the owning row. The write happens before the caller commits its
/// transaction.
pub async fn store(dir: &Path, payload: &FilePayload) -> Result<String, ApiError> {
    if !allowed_file(&payload.filename) {
        return Err(ApiError::Validation(
            "File type not allowed (png, jpg, jpeg, gif, pdf)".to_string(),
        ));
    }

    // Tolerate a full data URI as well as a bare base64 string.
    let encoded = match payload.content_base64.find("base64,") {
        Some(idx) => &payload.content_base64[idx + "base64,".len()..],
        None => payload.content_base64.as_str(),
    };
    let content = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| ApiError::Validation("Invalid base64 file content".to_string()))?;
    if content.len() > MAX_FILE_BYTES {
        return Err(ApiError::Validation("File is too large (16 MiB max)".to_string()));
    }

    let name = unique_name(&payload.filename, chrono::Utc::now());
    tokio::fs::write(dir.join(&name), &content)
        .await
        .map_err(|err| ApiError::Internal(format!("failed to store uploaded file: {err}")))?;

    Ok(format!("uploads/{name}"))
}

/// Read a previously stored file for the download endpoint.
pub async fn read_stored(dir: &Path, filename: &str) -> Result<Vec<u8>, ApiError> {
    let safe = sanitize_filename(filename)
        .ok_or_else(|| ApiError::Validation("Invalid filename".to_string()))?;
    tokio::fs::read(dir.join(safe)).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound("File not found".to_string())
        } else {
            ApiError::Internal(format!("failed to read stored file: {err}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("receipt.png"));
        assert!(allowed_file("receipt.PDF"));
        assert!(!allowed_file("receipt.exe"));
        assert!(!allowed_file("no-extension"));
    }

    #[test]
    fn test_unique_name_keeps_extension_and_slugs_stem() {
        let now = chrono::DateTime::parse_from_rfc3339("2025-08-01T12:30:45Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        assert_eq!(
            unique_name("My Payment Proof.PNG", now),
            "20250801_123045_my-payment-proof.png"
        );
    }

    #[test]
    fn test_sanitize_filename_rejects_traversal() {
        assert_eq!(sanitize_filename("logo.png"), Some("logo.png"));
        assert_eq!(sanitize_filename("../secret"), None);
        assert_eq!(sanitize_filename("a/b.png"), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.xyz"), "application/octet-stream");
    }
}
