//! # Stegaguard
//!
//! Hides a text message in the red-channel LSBs of an image and gates its
//! recovery behind any combination of a password, a TOTP code and a coarse
//! face-similarity check.
//!
//! ## Modules
//!
//! - [`processing`]: carrier I/O and the LSB bit channel
//! - [`factors`]: factor flags, password encryption, TOTP, face features, camera handle
//! - [`protocol`]: the embedded container's header and payload layout
//! - [`orchestrator`]: encode session state machine and the encode/inspect/decode surface
//! - [`common`]: configuration, errors and logging
//!
//! Output carriers must be stored losslessly (PNG); any lossy recompression
//! destroys the hidden container.

pub mod common;
pub mod factors;
pub mod orchestrator;
pub mod processing;
pub mod protocol;

pub use common::config::StegoConfig;
pub use common::error::StegoError;
pub use factors::{Factor, FactorFlags, FeatureVector};
pub use orchestrator::{
    DecodeOutcome, EncodeFactors, EncodeOutcome, Inspection, Steganographer, SuppliedFactors,
    TotpProvisioning,
};
pub use processing::CarrierImage;

/// [`Steganographer::encode`] with default configuration.
pub fn encode(
    image: &CarrierImage,
    message: &str,
    factors: EncodeFactors,
) -> Result<EncodeOutcome, StegoError> {
    Steganographer::default().encode(image, message, factors)
}

/// [`Steganographer::inspect`] with default configuration.
pub fn inspect(image: &CarrierImage) -> Inspection {
    Steganographer::default().inspect(image)
}

/// [`Steganographer::decode`] with default configuration and the system clock.
pub fn decode(
    image: &CarrierImage,
    supplied: &SuppliedFactors,
) -> Result<DecodeOutcome, StegoError> {
    Steganographer::default().decode(image, supplied)
}
