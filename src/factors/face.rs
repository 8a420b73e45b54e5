//! # Face Feature Vectors
//!
//! A coarse appearance fingerprint, not a biometric identity check.
//!
//! ## Extraction
//!
//! 1. Resize the frame to exactly 160x120 (triangle filter)
//! 2. Convert to grayscale with `0.299 R + 0.587 G + 0.114 B`
//! 3. Split into a 4x4 grid of 40x30 cells
//! 4. Histogram each cell into 16 bins (`luma >> 4`), scaled so the fullest bin is 255
//! 5. Concatenate: 16 cells x 16 bins = 256 bytes
//!
//! ## Matching
//!
//! Cosine similarity between two vectors, accepted when `>= threshold`
//! (0.85 by default). Lighting and pose must roughly match between enrollment
//! and verification, and a printed photo of the enrolled face will pass.

use image::imageops::{self, FilterType};
use image::DynamicImage;
use std::fmt;

use crate::common::error::StegoError;

pub const CAPTURE_WIDTH: u32 = 160;
pub const CAPTURE_HEIGHT: u32 = 120;
pub const GRID: u32 = 4;
pub const BINS: usize = 16;
/// Length of every feature vector in bytes.
pub const VECTOR_LEN: usize = (GRID * GRID) as usize * BINS;
/// Default minimum similarity for a match.
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// A 256-byte grid-histogram fingerprint of a face frame.
#[derive(Clone, PartialEq, Eq)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl TryFrom<Vec<u8>> for FeatureVector {
    type Error = StegoError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        if bytes.len() != VECTOR_LEN {
            return Err(StegoError::CorruptContainer(format!(
                "face template is {} bytes, expected {}",
                bytes.len(),
                VECTOR_LEN
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeatureVector({} bytes)", self.0.len())
    }
}

/// Build the feature vector for a captured frame of any size.
pub fn extract_features(frame: &DynamicImage) -> FeatureVector {
    let resized = imageops::resize(
        &frame.to_rgba8(),
        CAPTURE_WIDTH,
        CAPTURE_HEIGHT,
        FilterType::Triangle,
    );

    let cell_w = CAPTURE_WIDTH / GRID;
    let cell_h = CAPTURE_HEIGHT / GRID;
    let mut vector = Vec::with_capacity(VECTOR_LEN);

    for gy in 0..GRID {
        for gx in 0..GRID {
            let mut histogram = [0u32; BINS];
            for y in gy * cell_h..(gy + 1) * cell_h {
                for x in gx * cell_w..(gx + 1) * cell_w {
                    let p = resized.get_pixel(x, y);
                    histogram[(luma(p[0], p[1], p[2]) >> 4) as usize] += 1;
                }
            }

            let max = histogram.iter().copied().max().unwrap_or(0).max(1);
            vector.extend(
                histogram
                    .iter()
                    .map(|&count| ((count * 255 + max / 2) / max) as u8),
            );
        }
    }

    FeatureVector(vector)
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    y.round().clamp(0.0, 255.0) as u8
}

/// Cosine similarity in `[0, 1]`.
///
/// Returns 0 when the lengths differ or either vector is all zeros.
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Result of comparing a live frame against an enrolled vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCheck {
    pub similarity: f64,
    pub matched: bool,
}

/// Threshold policy for face verification.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    threshold: f64,
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl FaceMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Inclusive: a similarity equal to the threshold passes.
    pub fn accepts(&self, similarity: f64) -> bool {
        similarity >= self.threshold
    }

    pub fn compare(&self, stored: &FeatureVector, candidate: &FeatureVector) -> FaceCheck {
        let similarity = similarity(stored.as_bytes(), candidate.as_bytes());
        FaceCheck {
            similarity,
            matched: self.accepts(similarity),
        }
    }

    /// Extract the candidate's vector and compare it against `stored`.
    pub fn verify(&self, stored: &FeatureVector, candidate_frame: &DynamicImage) -> FaceCheck {
        self.compare(stored, &extract_features(candidate_frame))
    }
}
