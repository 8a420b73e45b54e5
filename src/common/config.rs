//! # Configuration Utilities
//!
//! Settings shared by the library facade and both front ends, loaded from TOML.
//!
//! Only presentation and policy knobs live here. Anything an encoder and a
//! decoder must agree on bit-for-bit (magic, KDF rounds, TOTP period, capture
//! size) is a constant in its own module instead.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::factors::face::DEFAULT_THRESHOLD;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: StegoConfig = load_config("config/stego.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Top-level configuration.
///
/// Every section falls back to its defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StegoConfig {
    pub totp: TotpConfig,
    pub face: FaceConfig,
    pub output: OutputConfig,
    pub web: WebConfig,
}

/// Labels used when rendering the `otpauth://` provisioning URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpConfig {
    /// Issuer shown by authenticator apps (e.g., "Stegaguard")
    pub issuer: String,
    /// Account label shown next to the issuer
    pub account: String,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Stegaguard".to_string(),
            account: "hidden-message".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Minimum cosine similarity accepted at verification (inclusive)
    pub threshold: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prepended to the source file stem when naming the produced PNG
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_prefix: "hidden_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address for the HTTP front end (e.g., "127.0.0.1:3000")
    pub address: String,
    /// Request body limit for multipart uploads
    pub max_upload_bytes: usize,
    /// How long an enrolled face template waits for its encode
    pub template_ttl_secs: u64,
    /// Enrolled templates held at once; the oldest is evicted beyond this
    pub max_templates: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
            template_ttl_secs: 600,
            max_templates: 256,
        }
    }
}

impl StegoConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let config: StegoConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every decode fail or pass trivially.
    pub fn validate(&self) -> Result<()> {
        let t = self.face.threshold;
        if !(t > 0.0 && t <= 1.0) {
            bail!("face.threshold must be in (0, 1], got {}", t);
        }
        if self.web.max_upload_bytes == 0 {
            bail!("web.max_upload_bytes must be positive");
        }
        if self.web.template_ttl_secs == 0 || self.web.max_templates == 0 {
            bail!("web.template_ttl_secs and web.max_templates must be positive");
        }
        Ok(())
    }

    /// Output filename for an encoded carrier, always PNG.
    ///
    /// `"photo.jpg"` becomes `"hidden_photo.png"` with the default prefix.
    pub fn output_file_name(&self, source_name: &str) -> String {
        let stem = std::path::Path::new(source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("image");
        format!("{}{}.png", self.output.file_prefix, stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StegoConfig::default();
        assert_eq!(config.face.threshold, 0.85);
        assert_eq!(config.output.file_prefix, "hidden_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[totp]\nissuer = \"Acme\"").unwrap();

        let config = StegoConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.totp.issuer, "Acme");
        assert_eq!(config.totp.account, "hidden-message");
        assert_eq!(config.web.address, "127.0.0.1:3000");
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[face]\nthreshold = 1.5").unwrap();

        assert!(StegoConfig::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_rejects_zero_template_limits() {
        let mut config = StegoConfig::default();
        config.web.max_templates = 0;
        assert!(config.validate().is_err());

        let mut config = StegoConfig::default();
        config.web.template_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_file_name() {
        let config = StegoConfig::default();
        assert_eq!(config.output_file_name("photo.jpg"), "hidden_photo.png");
        assert_eq!(config.output_file_name("dir/cat.png"), "hidden_cat.png");
        assert_eq!(config.output_file_name(""), "hidden_image.png");
    }
}
