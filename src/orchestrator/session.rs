//! # Encode Session
//!
//! The state machine a front end drives while the user picks factors.
//!
//! ```text
//! Idle ──select──▶ FactorsSelected ──inputs complete──▶ Ready ──embed──▶ Embedding ──▶ Done
//!                                                                              └──▶ Failed
//! ```
//!
//! Readiness rules:
//! - the message must be non-empty
//! - Password needs a non-empty password string
//! - TOTP needs nothing from the caller: the session generates the secret as
//!   soon as the factor is selected and exposes it via
//!   [`EncodeSession::totp_provisioning`] before embedding
//! - Face needs a previously enrolled [`FeatureVector`]
//! - with no factor selected, the caller must confirm unprotected embedding
//!
//! Embedding never mutates the source carrier; a failure leaves it untouched.

use log::{debug, info};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::common::config::TotpConfig;
use crate::common::error::StegoError;
use crate::factors::totp;
use crate::factors::{Factor, FactorFlags, FeatureVector, TotpSecret};
use crate::processing::{bit_channel, CarrierImage};
use crate::protocol::container::{self, PayloadParts};

/// Where an [`EncodeSession`] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Idle,
    FactorsSelected,
    Ready,
    Embedding,
    Done,
    Failed,
}

/// What a user needs to set up an authenticator app. Shown once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotpProvisioning {
    pub secret_base32: String,
    pub uri: String,
}

/// A carrier with a freshly embedded container.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub image: CarrierImage,
    pub totp_provisioning: Option<TotpProvisioning>,
}

/// Collects factor choices and inputs, then embeds.
pub struct EncodeSession {
    state: EncodeState,
    selected: FactorFlags,
    message: String,
    password: Zeroizing<String>,
    totp_secret: Option<TotpSecret>,
    face_template: Option<FeatureVector>,
    confirm_unprotected: bool,
    totp_labels: TotpConfig,
}

impl EncodeSession {
    pub fn new(totp_labels: TotpConfig) -> Self {
        Self {
            state: EncodeState::Idle,
            selected: FactorFlags::empty(),
            message: String::new(),
            password: Zeroizing::new(String::new()),
            totp_secret: None,
            face_template: None,
            confirm_unprotected: false,
            totp_labels,
        }
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    pub fn selected(&self) -> FactorFlags {
        self.selected
    }

    pub fn set_message(&mut self, message: &str) {
        self.message = message.to_string();
        self.refresh();
    }

    pub fn set_password(&mut self, password: &str) {
        self.password = Zeroizing::new(password.to_string());
        self.refresh();
    }

    pub fn set_face_template(&mut self, template: FeatureVector) {
        self.face_template = Some(template);
        self.refresh();
    }

    pub fn confirm_unprotected(&mut self, confirmed: bool) {
        self.confirm_unprotected = confirmed;
        self.refresh();
    }

    pub fn select(&mut self, factor: Factor) {
        if !self.selected.contains(factor) {
            self.toggle(factor);
        }
    }

    pub fn deselect(&mut self, factor: Factor) {
        if self.selected.contains(factor) {
            self.toggle(factor);
        }
    }

    /// Flip a factor, returning whether it is now selected.
    ///
    /// Selecting TOTP generates a new secret if none exists yet; deselecting
    /// it discards the secret so a stale one is never embedded.
    pub fn toggle(&mut self, factor: Factor) -> bool {
        let selected = self.selected.toggle(factor);
        if factor == Factor::Totp {
            if selected && self.totp_secret.is_none() {
                debug!("Generated TOTP secret for new session");
                self.totp_secret = Some(TotpSecret::generate());
            } else if !selected {
                self.totp_secret = None;
            }
        }
        self.refresh();
        selected
    }

    /// The TOTP secret to show the user, if TOTP is selected.
    pub fn totp_provisioning(&self) -> Option<TotpProvisioning> {
        let secret = self.totp_secret.as_ref()?;
        Some(TotpProvisioning {
            secret_base32: secret.to_base32(),
            uri: totp::provisioning_uri(
                secret,
                &self.totp_labels.issuer,
                &self.totp_labels.account,
            ),
        })
    }

    /// The first unmet requirement, or `Ok` when ready to embed.
    pub fn readiness(&self) -> Result<(), StegoError> {
        if self.message.is_empty() {
            return Err(StegoError::EmptyMessage);
        }
        for factor in self.selected.iter() {
            let present = match factor {
                Factor::Password => !self.password.is_empty(),
                Factor::Totp => self.totp_secret.is_some(),
                Factor::Face => self.face_template.is_some(),
            };
            if !present {
                return Err(StegoError::MissingFactor(factor));
            }
        }
        if self.selected.is_empty() && !self.confirm_unprotected {
            return Err(StegoError::NoFactorsAndNotConfirmed);
        }
        Ok(())
    }

    fn refresh(&mut self) {
        self.state = if self.readiness().is_ok() {
            EncodeState::Ready
        } else if !self.selected.is_empty() {
            EncodeState::FactorsSelected
        } else {
            EncodeState::Idle
        };
    }

    /// Build the container and write it into a copy of `carrier`.
    ///
    /// Readiness failures leave the session where it was; failures after
    /// that point (e.g. [`StegoError::CapacityExceeded`]) move it to `Failed`.
    pub fn embed(&mut self, carrier: &CarrierImage) -> Result<EncodeOutcome, StegoError> {
        self.readiness()?;

        self.state = EncodeState::Embedding;
        match self.build_and_embed(carrier) {
            Ok(outcome) => {
                self.state = EncodeState::Done;
                Ok(outcome)
            }
            Err(e) => {
                self.state = EncodeState::Failed;
                Err(e)
            }
        }
    }

    fn build_and_embed(&self, carrier: &CarrierImage) -> Result<EncodeOutcome, StegoError> {
        let parts = PayloadParts {
            totp_secret: self.totp_secret.as_ref().map(|s| s.as_bytes().to_vec()),
            face_template: self.face_template.as_ref().map(|f| f.as_bytes().to_vec()),
            message: self.message.as_bytes().to_vec(),
        };

        let payload = Zeroizing::new(container::build_payload(self.selected, &parts)?);
        let password = Some(self.password.as_str()).filter(|p| !p.is_empty());
        let bytes = container::wrap(&payload, self.selected, password)?;

        let mut image = carrier.clone();
        bit_channel::write_bytes(&mut image, &bytes)?;

        info!(
            "🔒 Embedded {}-byte container ({} bits of {}) with factors [{}]",
            bytes.len(),
            bytes.len() * 8,
            bit_channel::capacity(&image),
            self.selected
        );

        Ok(EncodeOutcome {
            image,
            totp_provisioning: self.totp_provisioning(),
        })
    }
}
