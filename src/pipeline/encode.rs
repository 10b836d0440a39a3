//! Image encoding: PNG bytes → base64 `ImageData` for the provider request.
//!
//! The rasterizer hands back raw PNG bytes so that the generator seam stays
//! provider-agnostic; only the edgequake-llm adapter needs the base64 form.
//! `detail: "high"` keeps slide fine print legible to GPT-4-class models.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap PNG bytes as a base64 image attachment.
pub fn encode_png(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_png_bytes() {
        let data = encode_png(b"\x89PNG\r\n\x1a\nfake");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
