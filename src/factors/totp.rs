//! Time-based one-time codes (RFC 6238 style, HMAC-SHA1, 6 digits, 30 s steps).
//!
//! The shared secret is 20 random bytes generated at encode time, embedded in
//! the container, and shown to the user exactly once (Base32 text plus an
//! `otpauth://` URI for QR provisioning). At decode time the supplied code is
//! checked against the previous, current and next time step, so up to one
//! step of clock drift between phone and verifier is absorbed.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::fmt;

use crate::common::error::StegoError;

type HmacSha1 = Hmac<Sha1>;

/// Secret length in bytes.
pub const SECRET_LEN: usize = 20;
/// Length of one time step in seconds.
pub const STEP_SECS: i64 = 30;
/// Number of decimal digits in a code.
pub const DIGITS: usize = 6;
/// Steps accepted on either side of the current one.
pub const SKEW_STEPS: i64 = 1;

const MODULUS: u32 = 1_000_000;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Source of the current Unix time, in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock frozen at a given Unix time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Shared TOTP secret. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    /// 20 fresh random bytes from the thread RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_base32(text: &str) -> Result<Self, StegoError> {
        base32_decode(text).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base32(&self) -> String {
        base32_encode(&self.0)
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TotpSecret({} bytes)", self.0.len())
    }
}

impl Drop for TotpSecret {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.0);
    }
}

/// Time step index containing `unix_time`.
pub fn time_step(unix_time: i64) -> i64 {
    unix_time.div_euclid(STEP_SECS)
}

/// HOTP value for a counter: dynamic truncation of HMAC-SHA1, zero-padded.
pub fn hotp(secret: &[u8], counter: u64) -> String {
    // HMAC pads or hashes the key, so every length is accepted
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0F) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7F,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    format!("{:0width$}", binary % MODULUS, width = DIGITS)
}

/// The code valid at `unix_time`.
pub fn code_at(secret: &TotpSecret, unix_time: i64) -> String {
    hotp(secret.as_bytes(), time_step(unix_time).max(0) as u64)
}

/// Check `code` against the steps for `now - 30s`, `now` and `now + 30s`.
///
/// Anything other than exactly six ASCII digits (after trimming) is rejected.
pub fn verify(secret: &TotpSecret, code: &str, now: i64) -> bool {
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let current = time_step(now);
    (current - SKEW_STEPS..=current + SKEW_STEPS)
        .filter(|step| *step >= 0)
        .any(|step| hotp(secret.as_bytes(), step as u64) == code)
}

/// `otpauth://` URI for authenticator apps.
pub fn provisioning_uri(secret: &TotpSecret, issuer: &str, account: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        percent_encode(issuer),
        percent_encode(account),
        secret.to_base32(),
        percent_encode(issuer),
        DIGITS,
        STEP_SECS
    )
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// RFC 4648 Base32, no padding.
pub fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &b in bytes {
        buffer = (buffer << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

/// RFC 4648 Base32 decoding. Case-insensitive; spaces and `=` are ignored.
pub fn base32_decode(text: &str) -> Result<Vec<u8>, StegoError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in text.chars() {
        if c == '=' || c.is_whitespace() {
            continue;
        }
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u32 - 'A' as u32,
            c @ '2'..='7' => c as u32 - '2' as u32 + 26,
            _ => return Err(StegoError::InvalidBase32),
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}
