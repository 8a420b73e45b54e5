//! # Image Processing
//!
//! Carrier image I/O and the LSB bit channel the container is written into.

pub mod bit_channel;
pub mod carrier;

pub use carrier::CarrierImage;
