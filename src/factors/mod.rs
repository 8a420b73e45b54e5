//! # Authentication Factors
//!
//! The independently selectable mechanisms that gate message recovery.
//!
//! ## Modules
//!
//! - [`flags`]: the [`Factor`] enum and the [`FactorFlags`] set stored in the header
//! - [`crypto`]: PBKDF2 + AES-256-GCM password sealing
//! - [`totp`]: one-time code secrets, Base32 and verification
//! - [`face`]: grid-histogram feature vectors and similarity matching
//! - [`camera`]: scoped capture-device handle used for face frames
//! - [`enrollment`]: expiring store for templates enrolled ahead of an encode

pub mod camera;
pub mod crypto;
pub mod enrollment;
pub mod face;
pub mod flags;
pub mod totp;

pub use face::{FaceMatcher, FeatureVector};
pub use flags::{Factor, FactorFlags};
pub use totp::{Clock, FixedClock, SystemClock, TotpSecret};
