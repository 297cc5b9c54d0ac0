use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::config::IngestOptions;
use crate::error::IngestError;

/// A size-bounded, re-encoded image ready to be stored inline with its
/// record. `width`/`height` are the decoded dimensions of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Aspect-preserving clamp of the longer edge to `max_edge`. Images already
/// within the limit keep their dimensions; nothing is ever upscaled. The
/// shorter edge is floor-scaled but never below one pixel.
pub fn target_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge {
        return (width, height);
    }

    if width >= height {
        let scaled = (u64::from(height) * u64::from(max_edge) / u64::from(width)) as u32;
        (max_edge, scaled.max(1))
    } else {
        let scaled = (u64::from(width) * u64::from(max_edge) / u64::from(height)) as u32;
        (scaled.max(1), max_edge)
    }
}

/// Runs the whole pipeline on the calling thread: declared-type gate, decode,
/// downscale, JPEG re-encode, payload ceiling check.
pub fn encode_payload(
    filename: &str,
    bytes: &[u8],
    options: &IngestOptions,
) -> Result<EncodedPayload, IngestError> {
    // Declared type only; the gate runs before any decode attempt.
    let declared = mime_guess::from_path(filename).first();
    match &declared {
        Some(mime) if mime.type_() == "image" => {}
        _ => {
            return Err(IngestError::UnsupportedType {
                filename: filename.to_string(),
                declared: declared
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }
    }

    let decoded = image::load_from_memory(bytes).map_err(|source| IngestError::Decode {
        filename: filename.to_string(),
        source,
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    let (target_width, target_height) = target_dimensions(width, height, options.max_edge);

    let resized = if (target_width, target_height) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    // JPEG has no alpha channel; flatten before encoding.
    let raster = resized.into_rgb8();
    let mut jpeg = Vec::new();
    raster
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, options.quality))
        .map_err(|source| IngestError::Encode {
            filename: filename.to_string(),
            source,
        })?;

    let data_uri = format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg));
    if data_uri.len() > options.max_payload_bytes {
        return Err(IngestError::PayloadTooLarge {
            filename: filename.to_string(),
            size: data_uri.len(),
            limit: options.max_payload_bytes,
        });
    }

    Ok(EncodedPayload {
        data_uri,
        width: target_width,
        height: target_height,
    })
}
