//! Multipart image uploads for `send-image`.

use axum::extract::Multipart;
use hive_core::error::HiveError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A validated image held in memory.
#[derive(Debug)]
pub(super) struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

/// Parsed `send-image` form.
#[derive(Debug)]
pub(super) struct ImageForm {
    pub number: String,
    pub caption: Option<String>,
    pub image: UploadedImage,
}

fn invalid(msg: impl Into<String>) -> HiveError {
    HiveError::InvalidUpload(msg.into())
}

/// Read the form, enforcing an image MIME type and `max_bytes`.
///
/// Oversized files are rejected as soon as the limit is crossed.
pub(super) async fn read_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<ImageForm, HiveError> {
    let mut number = None;
    let mut caption = None;
    let mut image = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let mime_type = field.content_type().unwrap_or_default().to_string();
                if !mime_type.starts_with("image/") {
                    return Err(invalid(format!(
                        "only image files are allowed (got '{mime_type}')"
                    )));
                }
                let extension = extension_for(field.file_name(), &mime_type);

                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| invalid(format!("failed to read image: {e}")))?
                {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(invalid(format!(
                            "image exceeds the {max_bytes} byte limit"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if bytes.is_empty() {
                    return Err(invalid("image is empty"));
                }

                image = Some(UploadedImage {
                    bytes,
                    mime_type,
                    extension,
                });
            }
            "number" | "caption" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| invalid(format!("failed to read field '{name}': {e}")))?;
                if name == "number" {
                    number = Some(value);
                } else if !value.is_empty() {
                    caption = Some(value);
                }
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| invalid("missing 'image' file"))?;
    let number = number.ok_or_else(|| HiveError::InvalidDestination(String::new()))?;
    Ok(ImageForm {
        number,
        caption,
        image,
    })
}

/// File extension from the uploaded name, else from the MIME subtype.
fn extension_for(file_name: Option<&str>, mime_type: &str) -> String {
    let from_name = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    let ext = match from_name {
        Some(ext) => ext.to_string(),
        None => match mime_type.trim_start_matches("image/") {
            "jpeg" => "jpg".to_string(),
            "svg+xml" => "svg".to_string(),
            sub if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => {
                sub.to_string()
            }
            _ => "img".to_string(),
        },
    };
    ext.to_ascii_lowercase()
}

/// Write the image to `dir` as `image-{millis}.{ext}`.
pub(super) async fn save(dir: &Path, image: &UploadedImage) -> Result<PathBuf, HiveError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut millis = chrono::Utc::now().timestamp_millis();
    loop {
        let path = dir.join(format!("image-{millis}.{}", image.extension));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(&image.bytes).await?;
                file.flush().await?;
                return Ok(path);
            }
            // Another upload landed in the same millisecond.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => millis += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_file_name() {
        assert_eq!(extension_for(Some("cat.PNG"), "image/png"), "png");
        assert_eq!(extension_for(Some("photo.jpeg"), "image/jpeg"), "jpeg");
    }

    #[test]
    fn test_extension_from_mime() {
        assert_eq!(extension_for(None, "image/jpeg"), "jpg");
        assert_eq!(extension_for(Some("noext"), "image/webp"), "webp");
        assert_eq!(extension_for(None, "image/svg+xml"), "svg");
        assert_eq!(extension_for(Some("x.../"), "image/"), "img");
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let image = UploadedImage {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".into(),
            extension: "png".into(),
        };
        let a = save(tmp.path(), &image).await.unwrap();
        let b = save(tmp.path(), &image).await.unwrap();
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("image-"));
        assert_eq!(std::fs::read(&b).unwrap(), vec![1, 2, 3]);
    }
}
