//! # Encode / Inspect / Decode
//!
//! The UI-agnostic surface consumed by front ends.
//!
//! ## Decoding
//!
//! 1. Read the 9-byte header. No magic means nothing is hidden: a normal,
//!    success-shaped outcome, not an error.
//! 2. Reject headers whose length runs past the carrier (`CorruptContainer`).
//! 3. Make sure every input the flags demand was supplied, checking Password,
//!    TOTP, then Face; report the first gap as `MissingFactor`.
//! 4. Verify in fixed order: decrypt (password) → TOTP → face. The first
//!    failing check ends the decode with that factor's error; later checks
//!    never run, so a wrong password reveals nothing about the other factors.
//! 5. Return the message.

pub mod session;

use image::DynamicImage;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::common::config::StegoConfig;
use crate::common::error::StegoError;
use crate::factors::face::FaceMatcher;
use crate::factors::totp;
use crate::factors::{Clock, Factor, FactorFlags, FeatureVector, SystemClock, TotpSecret};
use crate::processing::{bit_channel, CarrierImage};
use crate::protocol::container::{self, ContainerHeader, HeaderScan, HEADER_LEN};

pub use session::{EncodeOutcome, EncodeSession, EncodeState, TotpProvisioning};

/// Factor choices and inputs for a one-shot [`Steganographer::encode`].
#[derive(Default)]
pub struct EncodeFactors {
    pub password: Option<String>,
    pub enable_totp: bool,
    pub face_template: Option<FeatureVector>,
    /// Required to embed with no factor at all.
    pub confirm_unprotected: bool,
}

/// Inputs a caller supplies to unlock a container.
#[derive(Default)]
pub struct SuppliedFactors {
    pub password: Option<String>,
    pub totp_code: Option<String>,
    pub face_frame: Option<DynamicImage>,
}

impl SuppliedFactors {
    fn has(&self, factor: Factor) -> bool {
        match factor {
            Factor::Password => self.password.as_deref().is_some_and(|p| !p.is_empty()),
            Factor::Totp => self.totp_code.as_deref().is_some_and(|c| !c.trim().is_empty()),
            Factor::Face => self.face_frame.is_some(),
        }
    }
}

/// Result of [`Steganographer::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub has_container: bool,
    pub required_factors: FactorFlags,
}

/// Result of a successful [`Steganographer::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The image carries no container.
    NothingHidden,
    Message(String),
}

/// Entry point for embedding and recovering protected messages.
#[derive(Clone)]
pub struct Steganographer {
    config: StegoConfig,
    matcher: FaceMatcher,
    clock: Arc<dyn Clock>,
}

impl Default for Steganographer {
    fn default() -> Self {
        Self::new(StegoConfig::default())
    }
}

impl Steganographer {
    pub fn new(config: StegoConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Use a specific time source for TOTP verification.
    pub fn with_clock(config: StegoConfig, clock: Arc<dyn Clock>) -> Self {
        let matcher = FaceMatcher::new(config.face.threshold);
        Self {
            config,
            matcher,
            clock,
        }
    }

    pub fn config(&self) -> &StegoConfig {
        &self.config
    }

    /// Start an interactive session for front ends that toggle factors step by step.
    pub fn session(&self) -> EncodeSession {
        EncodeSession::new(self.config.totp.clone())
    }

    /// Embed `message` into a copy of `image` behind the given factors.
    pub fn encode(
        &self,
        image: &CarrierImage,
        message: &str,
        factors: EncodeFactors,
    ) -> Result<EncodeOutcome, StegoError> {
        let mut session = self.session();
        session.set_message(message);

        if let Some(password) = factors.password {
            let password = Zeroizing::new(password);
            session.select(Factor::Password);
            session.set_password(&password);
        }
        if factors.enable_totp {
            session.select(Factor::Totp);
        }
        if let Some(template) = factors.face_template {
            session.select(Factor::Face);
            session.set_face_template(template);
        }
        session.confirm_unprotected(factors.confirm_unprotected);

        info!(
            "🔒 Encoding {}-byte message into {}x{} carrier, factors [{}]",
            message.len(),
            image.width(),
            image.height(),
            session.selected()
        );
        session.embed(image)
    }

    /// Report whether `image` holds a container and which factors it needs.
    /// Never fails.
    pub fn inspect(&self, image: &CarrierImage) -> Inspection {
        match scan_header(image) {
            HeaderScan::Found(header) => Inspection {
                has_container: true,
                required_factors: header.flags,
            },
            HeaderScan::NoContainer => Inspection {
                has_container: false,
                required_factors: FactorFlags::empty(),
            },
        }
    }

    /// Verify the supplied factors and recover the hidden message.
    pub fn decode(
        &self,
        image: &CarrierImage,
        supplied: &SuppliedFactors,
    ) -> Result<DecodeOutcome, StegoError> {
        let header = match scan_header(image) {
            HeaderScan::Found(header) => header,
            HeaderScan::NoContainer => {
                info!("🔍 No hidden data found");
                return Ok(DecodeOutcome::NothingHidden);
            }
        };

        let available_bits = bit_channel::capacity(image);
        if header.total_bits() > available_bits {
            return Err(StegoError::CorruptContainer(format!(
                "header declares {} payload bytes but the image only holds {} bits",
                header.payload_len, available_bits
            )));
        }

        if let Some(missing) = header.flags.iter().find(|f| !supplied.has(*f)) {
            debug!("Decode requires [{}], {} not supplied", header.flags, missing);
            return Err(StegoError::MissingFactor(missing));
        }

        let total_len = HEADER_LEN + header.payload_len as usize;
        let raw = bit_channel::read_bytes(image, total_len);
        let body = &raw[HEADER_LEN..];

        let payload = match container::unwrap(body, header.flags, supplied.password.as_deref()) {
            Ok(payload) => Zeroizing::new(payload),
            Err(StegoError::AuthenticationFailed) => {
                warn!("❌ Password verification failed");
                return Err(StegoError::WrongPassword);
            }
            Err(e) => return Err(e),
        };

        let parts = container::split_payload(&payload, header.flags)?;

        if let Some(secret) = parts.totp_secret {
            let secret = TotpSecret::from_bytes(secret);
            let code = supplied.totp_code.as_deref().unwrap_or_default();
            if !totp::verify(&secret, code, self.clock.now()) {
                warn!("❌ One-time code verification failed");
                return Err(StegoError::InvalidTotpCode);
            }
        }

        if let Some(template) = parts.face_template {
            let stored = FeatureVector::try_from(template)?;
            let frame = supplied
                .face_frame
                .as_ref()
                .ok_or(StegoError::MissingFactor(Factor::Face))?;
            let check = self.matcher.verify(&stored, frame);
            if !check.matched {
                warn!(
                    "❌ Face similarity {:.3} below threshold {:.2}",
                    check.similarity,
                    self.matcher.threshold()
                );
                return Err(StegoError::FaceMismatch {
                    similarity: check.similarity,
                });
            }
        }

        let message = String::from_utf8(parts.message)
            .map_err(|_| StegoError::CorruptContainer("message is not valid UTF-8".to_string()))?;

        info!("🔓 Recovered {}-byte message", message.len());
        Ok(DecodeOutcome::Message(message))
    }
}

fn scan_header(image: &CarrierImage) -> HeaderScan {
    ContainerHeader::parse(&bit_channel::read_bytes(image, HEADER_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::FixedClock;
    use image::{Rgba, RgbaImage};

    const NOW: i64 = 1_700_000_000;

    fn stego() -> Steganographer {
        Steganographer::with_clock(StegoConfig::default(), Arc::new(FixedClock(NOW)))
    }

    fn carrier(width: u32, height: u32) -> CarrierImage {
        CarrierImage::new(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 3 + y * 5) as u8, (x + y) as u8, 77, 255])
        }))
    }

    fn plain() -> EncodeFactors {
        EncodeFactors {
            confirm_unprotected: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_roundtrip() {
        let s = stego();
        let out = s.encode(&carrier(40, 40), "hello", plain()).unwrap();
        let decoded = s.decode(&out.image, &SuppliedFactors::default()).unwrap();
        assert_eq!(decoded, DecodeOutcome::Message("hello".to_string()));
    }

    #[test]
    fn test_inspect_fresh_image() {
        let s = stego();
        let img = carrier(40, 40);
        let inspection = s.inspect(&img);
        assert!(!inspection.has_container);
        assert!(inspection.required_factors.is_empty());
        assert_eq!(
            s.decode(&img, &SuppliedFactors::default()).unwrap(),
            DecodeOutcome::NothingHidden
        );
    }

    #[test]
    fn test_inspect_tiny_image() {
        let inspection = stego().inspect(&carrier(2, 2));
        assert!(!inspection.has_container);
    }

    #[test]
    fn test_totp_roundtrip_with_fixed_clock() {
        let s = stego();
        let out = s
            .encode(
                &carrier(40, 40),
                "otp protected",
                EncodeFactors {
                    enable_totp: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let provisioning = out.totp_provisioning.clone().unwrap();
        let secret = TotpSecret::from_base32(&provisioning.secret_base32).unwrap();

        let inspection = s.inspect(&out.image);
        assert_eq!(
            inspection.required_factors,
            FactorFlags::empty().with(Factor::Totp)
        );

        let good = SuppliedFactors {
            totp_code: Some(totp::code_at(&secret, NOW)),
            ..Default::default()
        };
        assert_eq!(
            s.decode(&out.image, &good).unwrap(),
            DecodeOutcome::Message("otp protected".to_string())
        );

        let stale = SuppliedFactors {
            totp_code: Some(totp::code_at(&secret, NOW - 120)),
            ..Default::default()
        };
        assert!(matches!(
            s.decode(&out.image, &stale),
            Err(StegoError::InvalidTotpCode)
        ));
    }

    #[test]
    fn test_blank_totp_code_counts_as_missing() {
        let s = stego();
        let out = s
            .encode(
                &carrier(40, 40),
                "otp protected",
                EncodeFactors {
                    enable_totp: true,
                    ..Default::default()
                },
            )
            .unwrap();

        for blank in ["", "   "] {
            let supplied = SuppliedFactors {
                totp_code: Some(blank.to_string()),
                ..Default::default()
            };
            assert!(matches!(
                s.decode(&out.image, &supplied),
                Err(StegoError::MissingFactor(Factor::Totp))
            ));
        }
    }

    #[test]
    fn test_length_past_capacity_is_corrupt() {
        let s = stego();
        let mut img = carrier(12, 12);
        let header = ContainerHeader {
            flags: FactorFlags::empty(),
            payload_len: 1_000,
        };
        bit_channel::write_bytes(&mut img, &header.to_bytes()).unwrap();

        assert!(s.inspect(&img).has_container);
        assert!(matches!(
            s.decode(&img, &SuppliedFactors::default()),
            Err(StegoError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_non_utf8_message_is_corrupt() {
        let s = stego();
        let mut img = carrier(12, 12);
        let bytes = container::wrap(&[0xFF, 0xFE], FactorFlags::empty(), None).unwrap();
        bit_channel::write_bytes(&mut img, &bytes).unwrap();

        assert!(matches!(
            s.decode(&img, &SuppliedFactors::default()),
            Err(StegoError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_encode_rejects_empty_message() {
        let result = stego().encode(&carrier(40, 40), "", plain());
        assert!(matches!(result, Err(StegoError::EmptyMessage)));
    }

    #[test]
    fn test_encode_rejects_unconfirmed_plaintext() {
        let result = stego().encode(&carrier(40, 40), "hi", EncodeFactors::default());
        assert!(matches!(result, Err(StegoError::NoFactorsAndNotConfirmed)));
    }

    #[test]
    fn test_empty_password_counts_as_missing() {
        let result = stego().encode(
            &carrier(40, 40),
            "hi",
            EncodeFactors {
                password: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(StegoError::MissingFactor(Factor::Password))
        ));
    }
}
