//! # Bit Channel Codec
//!
//! Stores one bit per pixel in the least significant bit of the red channel.
//!
//! ## Addressing
//!
//! Pixels are visited in row-major scan order starting at `(0, 0)`. Bit `i` of a
//! stream lives in the red LSB of pixel `i`, so an image holds exactly
//! `width * height` bits. Green, blue and alpha are never read or written.
//!
//! ## Byte Order
//!
//! Bytes are serialized MSB-first: the high bit of byte 0 goes to pixel 0.

use crate::common::error::StegoError;
use crate::processing::carrier::CarrierImage;

/// Index of the embedding channel within an RGBA pixel.
const CHANNEL: usize = 0;

/// Number of addressable bits in a carrier (one per pixel).
pub fn capacity(image: &CarrierImage) -> usize {
    image.width() as usize * image.height() as usize
}

/// Write `bits` into the carrier starting at pixel 0.
///
/// Fails with [`StegoError::CapacityExceeded`] before touching any pixel when
/// the stream is longer than the carrier. Pixels past the end of the stream
/// keep their original values.
pub fn write_bits(image: &mut CarrierImage, bits: &[bool]) -> Result<(), StegoError> {
    let available_bits = capacity(image);
    if bits.len() > available_bits {
        return Err(StegoError::CapacityExceeded {
            required_bits: bits.len(),
            available_bits,
        });
    }

    for (pixel, &bit) in image.pixels_mut().pixels_mut().zip(bits) {
        // Clear LSB and set it to our data bit
        pixel[CHANNEL] = (pixel[CHANNEL] & 0xFE) | bit as u8;
    }

    Ok(())
}

/// Read `n_bits` bits in scan order, clamped to the carrier's capacity.
pub fn read_bits(image: &CarrierImage, n_bits: usize) -> Vec<bool> {
    image
        .pixels()
        .pixels()
        .take(n_bits)
        .map(|pixel| pixel[CHANNEL] & 1 == 1)
        .collect()
}

/// Convenience: write whole bytes.
pub fn write_bytes(image: &mut CarrierImage, bytes: &[u8]) -> Result<(), StegoError> {
    write_bits(image, &bytes_to_bits(bytes))
}

/// Convenience: read `n_bytes` whole bytes. Returns fewer when the carrier runs out.
pub fn read_bytes(image: &CarrierImage, n_bytes: usize) -> Vec<u8> {
    bits_to_bytes(&read_bits(image, n_bytes.saturating_mul(8)))
}

/// Convert bytes to bits (MSB-first per byte).
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &b in bytes {
        for i in (0..8).rev() {
            bits.push(((b >> i) & 1) == 1);
        }
    }
    bits
}

/// Convert bits to bytes (MSB-first per byte).
/// Trailing bits that don't fill a full byte are discarded.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |b, &bit| (b << 1) | bit as u8))
        .collect()
}
