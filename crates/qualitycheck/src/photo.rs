//! Label photo handling.
//!
//! Text-oriented stores (CSV, `SQLite` text columns) keep photos as standard
//! base64 plus a BLAKE3 digest of the raw bytes. Decoding verifies the digest
//! so a truncated or hand-edited cell is detected instead of producing a
//! corrupt image.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Image container recognised from leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFormat {
    /// JPEG / JFIF.
    Jpeg,
    /// PNG.
    Png,
    /// GIF87a / GIF89a.
    Gif,
    /// RIFF WebP.
    Webp,
    /// Windows bitmap.
    Bmp,
    /// Anything else.
    Unknown,
}

impl PhotoFormat {
    /// Sniff the format from the first bytes of an image.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Self::Jpeg,
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Self::Png,
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Self::Gif,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::Webp,
            [b'B', b'M', ..] => Self::Bmp,
            _ => Self::Unknown,
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Unknown => "bin",
        }
    }
}

/// A photo of a unit's label, held as raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct LabelPhoto {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for LabelPhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelPhoto")
            .field("format", &self.format())
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Storage representation of a [`LabelPhoto`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPhoto {
    /// Standard-alphabet base64 of the image bytes.
    pub data: String,
    /// Hex BLAKE3 digest of the image bytes.
    pub digest: String,
}

impl LabelPhoto {
    /// Wrap raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhotoEncoding`] if `bytes` is empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::photo("image is empty"));
        }
        Ok(Self { bytes })
    }

    /// Read a photo from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`Error::PhotoEncoding`] if it is empty.
    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// The raw image bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty photos are rejected on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Detected image format.
    #[must_use]
    pub fn format(&self) -> PhotoFormat {
        PhotoFormat::detect(&self.bytes)
    }

    /// Hex BLAKE3 digest of the bytes.
    #[must_use]
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    /// Encode for a text column.
    #[must_use]
    pub fn encode(&self) -> EncodedPhoto {
        EncodedPhoto {
            data: general_purpose::STANDARD.encode(&self.bytes),
            digest: self.digest(),
        }
    }

    /// Decode a text column back into a photo.
    ///
    /// The digest is checked when present; stores written before digests
    /// existed pass an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhotoEncoding`] if the base64 is malformed, decodes
    /// to nothing, or does not match `digest`.
    pub fn decode(data: &str, digest: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| Error::photo(format!("invalid base64: {e}")))?;
        let photo = Self::from_bytes(bytes)?;

        if !digest.is_empty() && photo.digest() != digest {
            return Err(Error::photo("digest mismatch, stored image is corrupt"));
        }
        Ok(photo)
    }
}

/// Decode an optional stored photo, keeping the row when decoding fails.
///
/// Returns `None` for blank cells, and for undecodable ones after logging a
/// warning naming `serial`.
pub(crate) fn decode_or_warn(serial: &str, data: &str, digest: &str) -> Option<LabelPhoto> {
    if data.trim().is_empty() {
        return None;
    }
    match LabelPhoto::decode(data, digest) {
        Ok(photo) => Some(photo),
        Err(e) => {
            tracing::warn!(serial, error = %e, "Dropping undecodable label photo");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn jpeg() -> LabelPhoto {
        LabelPhoto::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'])
            .unwrap()
    }

    #[test]
    fn test_encode_decode_is_byte_identical() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend((0..=255u8).cycle().take(4096));
        let photo = LabelPhoto::from_bytes(bytes.clone()).unwrap();

        let encoded = photo.encode();
        let decoded = LabelPhoto::decode(&encoded.data, &encoded.digest).unwrap();

        assert_eq!(decoded.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn test_empty_photo_rejected() {
        let err = LabelPhoto::from_bytes(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::PhotoEncoding { .. }));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = LabelPhoto::decode("not*base64!", "").unwrap_err();
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn test_decode_digest_mismatch() {
        let encoded = jpeg().encode();
        let other = LabelPhoto::from_bytes(vec![1, 2, 3]).unwrap().digest();

        let err = LabelPhoto::decode(&encoded.data, &other).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn test_decode_without_digest() {
        let encoded = jpeg().encode();
        let decoded = LabelPhoto::decode(&encoded.data, "").unwrap();
        assert_eq!(decoded, jpeg());
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(jpeg().format(), PhotoFormat::Jpeg);
        assert_eq!(PhotoFormat::detect(&PNG_HEADER), PhotoFormat::Png);
        assert_eq!(PhotoFormat::detect(b"GIF89a...."), PhotoFormat::Gif);
        assert_eq!(PhotoFormat::detect(b"RIFF\x10\x00\x00\x00WEBPVP8 "), PhotoFormat::Webp);
        assert_eq!(PhotoFormat::detect(b"BM\x00\x00"), PhotoFormat::Bmp);
        assert_eq!(PhotoFormat::detect(b"hello"), PhotoFormat::Unknown);
    }

    #[test]
    fn test_extension() {
        assert_eq!(PhotoFormat::Jpeg.extension(), "jpg");
        assert_eq!(PhotoFormat::Unknown.extension(), "bin");
    }

    #[test]
    fn test_decode_or_warn_blank_and_bad() {
        assert!(decode_or_warn("SN1", "", "").is_none());
        assert!(decode_or_warn("SN1", "%%%", "").is_none());

        let encoded = jpeg().encode();
        assert_eq!(
            decode_or_warn("SN1", &encoded.data, &encoded.digest),
            Some(jpeg())
        );
    }

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", jpeg());
        assert!(debug.contains("Jpeg"));
        assert!(debug.contains("len"));
    }
}
