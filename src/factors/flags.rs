//! # Factor Flags
//!
//! The set of authentication factors a container demands, persisted as one
//! header byte. Call sites work with [`Factor`] values; the bit layout only
//! exists in [`FactorFlags::to_byte`] / [`FactorFlags::from_byte`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently selectable protection mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Password,
    Totp,
    Face,
}

impl Factor {
    /// All factors in verification order.
    pub const ALL: [Factor; 3] = [Factor::Password, Factor::Totp, Factor::Face];

    fn bit(self) -> u8 {
        match self {
            Factor::Password => 0x01,
            Factor::Totp => 0x02,
            Factor::Face => 0x04,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::Password => "password",
            Factor::Totp => "totp",
            Factor::Face => "face",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`Factor`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FactorFlags {
    password: bool,
    totp: bool,
    face: bool,
}

impl FactorFlags {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            password: true,
            totp: true,
            face: true,
        }
    }

    fn slot(&mut self, factor: Factor) -> &mut bool {
        match factor {
            Factor::Password => &mut self.password,
            Factor::Totp => &mut self.totp,
            Factor::Face => &mut self.face,
        }
    }

    pub fn contains(&self, factor: Factor) -> bool {
        match factor {
            Factor::Password => self.password,
            Factor::Totp => self.totp,
            Factor::Face => self.face,
        }
    }

    pub fn insert(&mut self, factor: Factor) {
        *self.slot(factor) = true;
    }

    pub fn remove(&mut self, factor: Factor) {
        *self.slot(factor) = false;
    }

    /// Flip a factor, returning whether it is now selected.
    pub fn toggle(&mut self, factor: Factor) -> bool {
        let slot = self.slot(factor);
        *slot = !*slot;
        *slot
    }

    pub fn with(mut self, factor: Factor) -> Self {
        self.insert(factor);
        self
    }

    pub fn is_empty(&self) -> bool {
        !(self.password || self.totp || self.face)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Selected factors, in verification order.
    pub fn iter(&self) -> impl Iterator<Item = Factor> + '_ {
        Factor::ALL.into_iter().filter(move |f| self.contains(*f))
    }

    pub fn to_byte(self) -> u8 {
        self.iter().fold(0, |acc, f| acc | f.bit())
    }

    /// Parse a header byte. Returns `None` if any undefined bit is set.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let known = Factor::ALL.iter().fold(0u8, |acc, f| acc | f.bit());
        if byte & !known != 0 {
            return None;
        }
        Some(
            Factor::ALL
                .into_iter()
                .filter(|f| byte & f.bit() != 0)
                .collect(),
        )
    }
}

impl FromIterator<Factor> for FactorFlags {
    fn from_iter<I: IntoIterator<Item = Factor>>(iter: I) -> Self {
        let mut flags = FactorFlags::empty();
        for factor in iter {
            flags.insert(factor);
        }
        flags
    }
}

impl fmt::Display for FactorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Factor::as_str).collect();
        f.write_str(&names.join("+"))
    }
}

// Serialized as a list of factor names, e.g. ["password", "totp"]
impl Serialize for FactorFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for FactorFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let factors = Vec::<Factor>::deserialize(deserializer)?;
        Ok(factors.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_layout() {
        assert_eq!(FactorFlags::empty().to_byte(), 0x00);
        assert_eq!(FactorFlags::empty().with(Factor::Password).to_byte(), 0x01);
        assert_eq!(FactorFlags::empty().with(Factor::Totp).to_byte(), 0x02);
        assert_eq!(FactorFlags::empty().with(Factor::Face).to_byte(), 0x04);
        assert_eq!(FactorFlags::all().to_byte(), 0x07);
    }

    #[test]
    fn test_from_byte_rejects_unknown_bits() {
        assert_eq!(FactorFlags::from_byte(0x05), Some(
            FactorFlags::empty().with(Factor::Password).with(Factor::Face)
        ));
        assert_eq!(FactorFlags::from_byte(0x08), None);
        assert_eq!(FactorFlags::from_byte(0xFF), None);
    }

    #[test]
    fn test_toggle() {
        let mut flags = FactorFlags::empty();
        assert!(flags.toggle(Factor::Totp));
        assert!(flags.contains(Factor::Totp));
        assert!(!flags.toggle(Factor::Totp));
        assert!(flags.is_empty());
    }

    #[test]
    fn test_iter_uses_verification_order() {
        let flags: FactorFlags = [Factor::Face, Factor::Password, Factor::Totp]
            .into_iter()
            .collect();
        let order: Vec<Factor> = flags.iter().collect();
        assert_eq!(order, vec![Factor::Password, Factor::Totp, Factor::Face]);
        assert_eq!(flags.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(FactorFlags::empty().to_string(), "none");
        let flags = FactorFlags::empty().with(Factor::Face).with(Factor::Password);
        assert_eq!(flags.to_string(), "password+face");
    }

    #[test]
    fn test_json_is_a_name_list() {
        let flags = FactorFlags::empty().with(Factor::Totp).with(Factor::Password);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["password","totp"]"#);

        let back: FactorFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
