//! Oriented decoding and EXIF carry-over.
//!
//! Sources are rotated upright from their EXIF orientation while loading, so
//! the captured EXIF block has its orientation tag reset to "normal" before
//! it is written back into exported files.

use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tracing::{debug, warn};

use crate::error::ProcessingCause;

/// Signature that some writers put in front of the TIFF data.
const EXIF_HEADER: &[u8] = b"Exif\0\0";
const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const VP8X_PAYLOAD_LEN: u32 = 10;
const VP8X_ALPHA: u8 = 0x10;
const VP8X_EXIF: u8 = 0x08;
const VP8L_ALPHA_BIT: u32 = 1 << 28;

/// A decoded source image, already upright.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Pixels with the EXIF orientation applied.
    pub image: DynamicImage,
    /// Raw EXIF block with its orientation reset to 1, if the source had one.
    pub exif: Option<Vec<u8>>,
}

/// Decode `path`, apply its EXIF orientation and capture its EXIF block.
///
/// Unreadable EXIF is logged and dropped; it never fails the load.
///
/// # Errors
///
/// Returns [`ProcessingCause`] if the file cannot be read or decoded.
pub fn load_oriented(path: &Path) -> Result<LoadedImage, ProcessingCause> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;

    let mut exif = decoder.exif_metadata().unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable EXIF");
        None
    });
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)?;
    if !matches!(orientation, Orientation::NoTransforms) {
        debug!(path = %path.display(), ?orientation, "applying EXIF orientation");
        image.apply_orientation(orientation);
    }

    if let Some(block) = exif.as_mut() {
        if Orientation::remove_from_exif_chunk(block).is_none() {
            debug!(path = %path.display(), "EXIF block has no orientation tag");
        }
    }

    Ok(LoadedImage { image, exif })
}

/// Attach `exif` to an encoded WebP file as an `EXIF` chunk.
///
/// Simple (`VP8 `/`VP8L`) files are promoted to the extended layout with a
/// `VP8X` header sized to `dimensions`; extended files get their EXIF flag
/// set. Anything that is not a RIFF/WEBP container is returned unchanged.
#[must_use]
pub fn embed_exif_in_webp(webp: Vec<u8>, exif: &[u8], dimensions: (u32, u32)) -> Vec<u8> {
    let exif = exif.strip_prefix(EXIF_HEADER).unwrap_or(exif);
    let is_webp = webp.len() >= RIFF_HEADER_LEN + CHUNK_HEADER_LEN
        && webp.starts_with(b"RIFF")
        && &webp[8..12] == b"WEBP";
    if exif.is_empty() || !is_webp {
        return webp;
    }
    let Ok(exif_len) = u32::try_from(exif.len()) else {
        warn!(len = exif.len(), "EXIF block too large for a WebP chunk, dropping it");
        return webp;
    };

    let first_chunk = &webp[RIFF_HEADER_LEN..RIFF_HEADER_LEN + 4];
    let mut out = Vec::with_capacity(webp.len() + exif.len() + 2 * CHUNK_HEADER_LEN + 12);
    out.extend_from_slice(&webp[..RIFF_HEADER_LEN]);

    if first_chunk == b"VP8X" {
        out.extend_from_slice(&webp[RIFF_HEADER_LEN..]);
        out[RIFF_HEADER_LEN + CHUNK_HEADER_LEN] |= VP8X_EXIF;
    } else {
        let lossless_alpha = first_chunk == b"VP8L"
            && webp
                .get(21..25)
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .is_some_and(|b| u32::from_le_bytes(b) & VP8L_ALPHA_BIT != 0);
        let flags = if lossless_alpha {
            VP8X_EXIF | VP8X_ALPHA
        } else {
            VP8X_EXIF
        };
        let (width, height) = dimensions;
        out.extend_from_slice(b"VP8X");
        out.extend_from_slice(&VP8X_PAYLOAD_LEN.to_le_bytes());
        out.extend_from_slice(&[flags, 0, 0, 0]);
        out.extend_from_slice(&width.saturating_sub(1).to_le_bytes()[..3]);
        out.extend_from_slice(&height.saturating_sub(1).to_le_bytes()[..3]);
        out.extend_from_slice(&webp[RIFF_HEADER_LEN..]);
    }

    out.extend_from_slice(b"EXIF");
    out.extend_from_slice(&exif_len.to_le_bytes());
    out.extend_from_slice(exif);
    if exif.len() % 2 == 1 {
        out.push(0);
    }

    let Ok(riff_size) = u32::try_from(out.len() - 8) else {
        warn!(len = out.len(), "WebP file too large for EXIF, dropping it");
        return webp;
    };
    out[4..8].copy_from_slice(&riff_size.to_le_bytes());
    out
}
