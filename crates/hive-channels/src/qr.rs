//! QR code rendering for the terminal and as PNG artifacts.

use hive_core::error::HiveError;
use std::path::PathBuf;
use tracing::debug;

/// Generate a compact QR code for terminal display using Unicode half-block characters.
///
/// Packs two rows of modules into one line of text using `▀`, `▄`, `█`, and space.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, HiveError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| HiveError::Store(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::new();
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }

    Ok(out)
}

/// Generate a QR code as PNG image bytes.
///
/// `scale` is the edge length of one module in pixels.
pub fn generate_qr_image(qr_data: &str, scale: u32) -> Result<Vec<u8>, HiveError> {
    use image::{ImageBuffer, Luma};
    use qrcode::{Color, QrCode};

    let code = QrCode::new(qr_data.as_bytes())
        .map_err(|e| HiveError::Store(format!("QR generation failed: {e}")))?;

    let quiet_zone: u32 = 4;
    let modules = code.width() as u32;
    let img_size = (modules + quiet_zone * 2) * scale;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let (cx, cy) = (x / scale, y / scale);
        if cx < quiet_zone || cy < quiet_zone {
            return Luma([255u8]);
        }
        let (mx, my) = (cx - quiet_zone, cy - quiet_zone);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| HiveError::Store(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Writes one QR image per session into a public directory.
///
/// The artifact for session `id` is always `qrcode-{id}.png`, so a new
/// payload for the same session overwrites the previous image.
#[derive(Debug, Clone)]
pub struct QrRenderer {
    public_dir: PathBuf,
    scale: u32,
}

impl QrRenderer {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
            scale: 8,
        }
    }

    fn file_name(session_id: &str) -> String {
        format!("qrcode-{session_id}.png")
    }

    /// URL path under which the artifact for `session_id` is served.
    pub fn artifact_ref(session_id: &str) -> String {
        format!("/{}", Self::file_name(session_id))
    }

    /// Render `payload` for `session_id` and return its artifact reference.
    pub async fn render(&self, session_id: &str, payload: &str) -> Result<String, HiveError> {
        let payload = payload.to_string();
        let scale = self.scale;
        let png = tokio::task::spawn_blocking(move || generate_qr_image(&payload, scale))
            .await
            .map_err(|e| HiveError::Store(format!("QR render task failed: {e}")))??;

        tokio::fs::create_dir_all(&self.public_dir).await?;
        let dest = self.public_dir.join(Self::file_name(session_id));
        let tmp = self
            .public_dir
            .join(format!(".{}.tmp", Self::file_name(session_id)));
        tokio::fs::write(&tmp, &png).await?;
        tokio::fs::rename(&tmp, &dest).await?;

        debug!("rendered QR for {session_id} at {}", dest.display());
        Ok(Self::artifact_ref(session_id))
    }

    /// Remove the artifact for `session_id`, if any.
    pub async fn remove(&self, session_id: &str) {
        let _ = tokio::fs::remove_file(self.public_dir.join(Self::file_name(session_id))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_qr_terminal() {
        let qr = generate_qr_terminal("test-data").unwrap();
        assert!(!qr.is_empty());
        assert!(qr.lines().count() > 5);
    }

    #[test]
    fn test_generate_qr_image() {
        let png = generate_qr_image("test-data", 8).unwrap();
        // PNG magic bytes.
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_artifact_ref_is_deterministic() {
        assert_eq!(QrRenderer::artifact_ref("s1"), "/qrcode-s1.png");
        assert_eq!(QrRenderer::artifact_ref("s1"), QrRenderer::artifact_ref("s1"));
    }

    #[tokio::test]
    async fn test_render_writes_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = QrRenderer::new(tmp.path().join("public"));

        let r1 = renderer.render("s1", "first").await.unwrap();
        let path = tmp.path().join("public").join("qrcode-s1.png");
        let first = std::fs::read(&path).unwrap();

        let r2 = renderer.render("s1", "a-much-longer-second-payload-0123456789").await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(r1, r2);
        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(tmp.path().join("public")).unwrap().count(), 1);

        renderer.remove("s1").await;
        assert!(!path.exists());
    }
}
