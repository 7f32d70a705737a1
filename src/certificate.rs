// 📜 Certificate Presenter - one owner plus a QR code pointing at its public page
//
// The QR payload is the absolute /user_data/<id>/ URL; the image is handed
// to the page as a base64 PNG data URL so no extra request is needed.

use crate::error::{CertError, Result};
use crate::owner::Owner;
use crate::resolver;
use crate::store::Stores;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::{Color, EcLevel, QrCode};
use serde::Serialize;
use tracing::{debug, info};

pub const NOT_FOUND_MESSAGE: &str = "Certificate not found in both databases.";

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// QR ENCODER
// ============================================================================

/// Turns text into PNG bytes
pub trait QrEncoder: Send + Sync {
    fn encode_png(&self, text: &str) -> Result<Vec<u8>>;
}

/// `qrcode` module matrix rendered to a grayscale PNG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngQrEncoder {
    /// Pixels per module
    pub box_size: u32,

    /// Quiet zone width, in modules
    pub border: u32,
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self {
            box_size: 8,
            border: 5,
        }
    }
}

impl PngQrEncoder {
    pub fn new(box_size: u32, border: u32) -> Self {
        Self {
            box_size: box_size.max(1),
            border,
        }
    }

    /// Image side length in pixels; `None` when it does not fit
    fn side_for(&self, modules: u32) -> Option<u32> {
        let quiet = self.border.checked_mul(2)?;
        let side = modules.checked_add(quiet)?.checked_mul(self.box_size)?;
        side.checked_mul(side)?;
        Some(side)
    }

    fn rasterize(&self, code: &QrCode) -> Result<(u32, Vec<u8>)> {
        let modules = code.width() as u32;
        let side = self.side_for(modules).ok_or_else(|| {
            CertError::Qr(format!(
                "image too large for box size {} and border {}",
                self.box_size, self.border
            ))
        })?;

        let colors = code.to_colors();
        let mut pixels = vec![0xFFu8; side as usize * side as usize];
        for (index, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }

            let module_x = index as u32 % modules + self.border;
            let module_y = index as u32 / modules + self.border;

            for dy in 0..self.box_size {
                let row = (module_y * self.box_size + dy) * side;
                let start = (row + module_x * self.box_size) as usize;
                pixels[start..start + self.box_size as usize].fill(0x00);
            }
        }

        Ok((side, pixels))
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode_png(&self, text: &str) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), EcLevel::L)?;
        let (side, pixels) = self.rasterize(&code)?;

        let mut buffer = Vec::new();
        let mut encoder = png::Encoder::new(&mut buffer, side, side);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;

        debug!(side, bytes = buffer.len(), "encoded QR image");
        Ok(buffer)
    }
}

// ============================================================================
// DETAIL URL
// ============================================================================

/// Builds absolute links to the public record page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailUrlBuilder {
    base_url: String,
}

impl DetailUrlBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn user_data_url(&self, id: i64) -> String {
        format!("{}/user_data/{}/", self.base_url, id)
    }
}

// ============================================================================
// PRESENTER
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CertificateView {
    pub certificate: Option<Owner>,
    pub qr_image_url: Option<String>,
    pub error_message: Option<String>,
}

impl CertificateView {
    pub fn not_found() -> Self {
        Self {
            certificate: None,
            qr_image_url: None,
            error_message: Some(NOT_FOUND_MESSAGE.to_string()),
        }
    }
}

/// QR data URL for a resolved owner
pub fn render_certificate<F>(
    owner: Owner,
    detail_url: F,
    encoder: &dyn QrEncoder,
) -> Result<(Owner, String)>
where
    F: Fn(i64) -> String,
{
    let url = detail_url(owner.id);
    let png = encoder.encode_png(&url)?;
    let qr_image_url = format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(png));

    Ok((owner, qr_image_url))
}

/// Resolve `id` across both stores and build the certificate view.
/// Absence becomes a view with a message, never an error.
pub fn present<F>(
    stores: &Stores,
    id: i64,
    detail_url: F,
    encoder: &dyn QrEncoder,
) -> Result<CertificateView>
where
    F: Fn(i64) -> String,
{
    let Some(owner) = resolver::resolve(stores, id)? else {
        info!(id, "certificate requested for unknown owner");
        return Ok(CertificateView::not_found());
    };

    let (owner, qr_image_url) = render_certificate(owner, detail_url, encoder)?;

    Ok(CertificateView {
        certificate: Some(owner),
        qr_image_url: Some(qr_image_url),
        error_message: None,
    })
}
