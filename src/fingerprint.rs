//! Perceptual fingerprints for decoded frames

use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, HasherConfig};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
}

/// Capability: a similarity-preserving fingerprint of an image file.
pub trait PerceptualHasher: Send + Sync {
    fn fingerprint(&self, image_path: &Path) -> Result<String, FingerprintError>;
}

/// DCT-based pHash (coefficients against their median), hex encoded
#[derive(Debug, Clone)]
pub struct PhashFingerprinter {
    width: u32,
    height: u32,
}

impl PhashFingerprinter {
    pub fn new() -> Self {
        Self { width: 8, height: 8 }
    }

    pub fn hash_image(&self, image: &DynamicImage) -> String {
        let hasher = HasherConfig::new()
            .hash_size(self.width, self.height)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        to_hex(hasher.hash_image(image).as_bytes())
    }
}

impl Default for PhashFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher for PhashFingerprinter {
    fn fingerprint(&self, image_path: &Path) -> Result<String, FingerprintError> {
        let image = ImageReader::open(image_path)
            .map_err(|e| FingerprintError::Open {
                path: image_path.display().to_string(),
                message: e.to_string(),
            })?
            .with_guessed_format()
            .map_err(|e| FingerprintError::Open {
                path: image_path.display().to_string(),
                message: e.to_string(),
            })?
            .decode()
            .map_err(|e| FingerprintError::Decode {
                path: image_path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(self.hash_image(&image))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
