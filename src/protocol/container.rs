//! # Container Format
//!
//! The self-describing structure written into a carrier's bit channel.
//!
//! ## Header (9 bytes)
//!
//! ```text
//! offset  size  field
//!  0       4    magic "SGA1"
//!  4       1    factor flags (bit0=password, bit1=totp, bit2=face)
//!  5       4    payload length in bytes (u32 BE)
//! ```
//!
//! ## Payload
//!
//! Before optional encryption the payload is a fixed-order concatenation:
//!
//! ```text
//! [if totp] 1-byte len + TOTP secret
//! [if face] 1-byte len + face feature vector
//! [rest   ] message bytes (no prefix, always last)
//! ```
//!
//! A length byte of `0` stands for 256, so each part holds 1 to 256 bytes.
//! When the password flag is set the whole payload is sealed with
//! [`crypto::encrypt`](crate::factors::crypto::encrypt) and the header length is
//! the sealed length (salt + iv + ciphertext + tag). The header itself is
//! never encrypted.

use log::debug;

use crate::common::error::StegoError;
use crate::factors::crypto;
use crate::factors::{Factor, FactorFlags};

pub const MAGIC: [u8; 4] = *b"SGA1";
pub const HEADER_LEN: usize = 9;
/// Largest part a one-byte length prefix can describe.
pub const MAX_PART_LEN: usize = 256;

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub flags: FactorFlags,
    pub payload_len: u32,
}

/// Outcome of looking for a header in a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScan {
    Found(ContainerHeader),
    /// No container: wrong magic, undefined flag bits, or too few bits.
    NoContainer,
}

impl ContainerHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&MAGIC);
        out[4] = self.flags.to_byte();
        out[5..].copy_from_slice(&self.payload_len.to_be_bytes());
        out
    }

    /// Recognize a header. Never fails: anything unrecognizable is
    /// [`HeaderScan::NoContainer`], the common case for ordinary images.
    pub fn parse(bytes: &[u8]) -> HeaderScan {
        if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
            return HeaderScan::NoContainer;
        }
        let Some(flags) = FactorFlags::from_byte(bytes[4]) else {
            debug!("Magic matched but flag byte {:#04x} is undefined", bytes[4]);
            return HeaderScan::NoContainer;
        };
        let payload_len = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        HeaderScan::Found(ContainerHeader { flags, payload_len })
    }

    /// Total container size in bits (header + payload).
    pub fn total_bits(&self) -> usize {
        total_bits(self.payload_len as usize)
    }
}

/// Bits needed to embed a container with `payload_len` payload bytes.
pub fn total_bits(payload_len: usize) -> usize {
    (HEADER_LEN + payload_len).saturating_mul(8)
}

/// The pieces of a decrypted payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadParts {
    pub totp_secret: Option<Vec<u8>>,
    pub face_template: Option<Vec<u8>>,
    pub message: Vec<u8>,
}

/// Concatenate the parts `flags` calls for, in the fixed order.
///
/// Fails with [`StegoError::MissingFactor`] if a flagged part is absent and
/// with [`StegoError::CorruptContainer`] if a part is empty or over 256 bytes.
/// Parts supplied for unflagged factors are ignored.
pub fn build_payload(flags: FactorFlags, parts: &PayloadParts) -> Result<Vec<u8>, StegoError> {
    let mut out = Vec::new();

    if flags.contains(Factor::Totp) {
        let secret = parts
            .totp_secret
            .as_deref()
            .ok_or(StegoError::MissingFactor(Factor::Totp))?;
        push_part(&mut out, Factor::Totp, secret)?;
    }
    if flags.contains(Factor::Face) {
        let template = parts
            .face_template
            .as_deref()
            .ok_or(StegoError::MissingFactor(Factor::Face))?;
        push_part(&mut out, Factor::Face, template)?;
    }

    out.extend_from_slice(&parts.message);
    Ok(out)
}

fn push_part(out: &mut Vec<u8>, factor: Factor, part: &[u8]) -> Result<(), StegoError> {
    if part.is_empty() || part.len() > MAX_PART_LEN {
        return Err(StegoError::CorruptContainer(format!(
            "{} part must be 1-{} bytes, got {}",
            factor,
            MAX_PART_LEN,
            part.len()
        )));
    }
    // 256 wraps to 0
    out.push(part.len() as u8);
    out.extend_from_slice(part);
    Ok(())
}

/// Split a decrypted payload back into its parts, in the same fixed order.
pub fn split_payload(payload: &[u8], flags: FactorFlags) -> Result<PayloadParts, StegoError> {
    let mut rest = payload;
    let mut parts = PayloadParts::default();

    if flags.contains(Factor::Totp) {
        parts.totp_secret = Some(take_part(&mut rest, Factor::Totp)?);
    }
    if flags.contains(Factor::Face) {
        parts.face_template = Some(take_part(&mut rest, Factor::Face)?);
    }

    parts.message = rest.to_vec();
    Ok(parts)
}

fn take_part(rest: &mut &[u8], factor: Factor) -> Result<Vec<u8>, StegoError> {
    let (&len_byte, tail) = rest.split_first().ok_or_else(|| {
        StegoError::CorruptContainer(format!("payload ends before {} part", factor))
    })?;
    let len = if len_byte == 0 { MAX_PART_LEN } else { len_byte as usize };
    if tail.len() < len {
        return Err(StegoError::CorruptContainer(format!(
            "{} part declares {} bytes but only {} remain",
            factor,
            len,
            tail.len()
        )));
    }
    let (part, tail) = tail.split_at(len);
    *rest = tail;
    Ok(part.to_vec())
}

/// Produce `header || payload`, sealing the payload when the password flag is set.
pub fn wrap(
    payload: &[u8],
    flags: FactorFlags,
    password: Option<&str>,
) -> Result<Vec<u8>, StegoError> {
    let body = if flags.contains(Factor::Password) {
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or(StegoError::MissingFactor(Factor::Password))?;
        crypto::encrypt(payload, password)?
    } else {
        payload.to_vec()
    };

    let payload_len = u32::try_from(body.len()).map_err(|_| StegoError::CapacityExceeded {
        required_bits: total_bits(body.len()),
        available_bits: total_bits(u32::MAX as usize),
    })?;

    let header = ContainerHeader { flags, payload_len };
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Recover the plaintext payload from the bytes following the header.
///
/// Propagates [`StegoError::AuthenticationFailed`] from the cipher.
pub fn unwrap(
    body: &[u8],
    flags: FactorFlags,
    password: Option<&str>,
) -> Result<Vec<u8>, StegoError> {
    if flags.contains(Factor::Password) {
        let password = password.ok_or(StegoError::MissingFactor(Factor::Password))?;
        crypto::decrypt(body, password)
    } else {
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(factors: &[Factor]) -> FactorFlags {
        factors.iter().copied().collect()
    }

    #[test]
    fn test_header_layout() {
        let header = ContainerHeader {
            flags: flags(&[Factor::Password, Factor::Face]),
            payload_len: 0x0102_0304,
        };
        assert_eq!(
            header.to_bytes(),
            [b'S', b'G', b'A', b'1', 0x05, 0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(ContainerHeader::parse(&header.to_bytes()), HeaderScan::Found(header));
    }

    #[test]
    fn test_parse_no_container() {
        assert_eq!(ContainerHeader::parse(&[0u8; 9]), HeaderScan::NoContainer);
        assert_eq!(ContainerHeader::parse(b"SGA1"), HeaderScan::NoContainer);
        assert_eq!(
            ContainerHeader::parse(&[b'S', b'G', b'A', b'1', 0x80, 0, 0, 0, 1]),
            HeaderScan::NoContainer
        );
    }

    #[test]
    fn test_payload_order_and_prefixes() {
        let parts = PayloadParts {
            totp_secret: Some(vec![0xAA; 20]),
            face_template: Some(vec![0xBB; 256]),
            message: b"hi".to_vec(),
        };
        let payload = build_payload(flags(&[Factor::Totp, Factor::Face]), &parts).unwrap();

        assert_eq!(payload.len(), 1 + 20 + 1 + 256 + 2);
        assert_eq!(payload[0], 20);
        assert_eq!(payload[21], 0); // 256 wraps
        assert_eq!(&payload[payload.len() - 2..], b"hi");

        let back = split_payload(&payload, flags(&[Factor::Totp, Factor::Face])).unwrap();
        assert_eq!(back, parts);
    }

    #[test]
    fn test_unflagged_parts_ignored() {
        let parts = PayloadParts {
            totp_secret: Some(vec![1; 20]),
            face_template: None,
            message: b"msg".to_vec(),
        };
        let payload = build_payload(FactorFlags::empty(), &parts).unwrap();
        assert_eq!(payload, b"msg");
    }

    #[test]
    fn test_missing_part_is_missing_factor() {
        let parts = PayloadParts {
            message: b"msg".to_vec(),
            ..Default::default()
        };
        assert!(matches!(
            build_payload(flags(&[Factor::Face]), &parts),
            Err(StegoError::MissingFactor(Factor::Face))
        ));
    }

    #[test]
    fn test_oversized_part_rejected() {
        let parts = PayloadParts {
            totp_secret: Some(vec![1; 257]),
            ..Default::default()
        };
        assert!(matches!(
            build_payload(flags(&[Factor::Totp]), &parts),
            Err(StegoError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_truncated_part_is_corrupt() {
        assert!(matches!(
            split_payload(&[20, 1, 2, 3], flags(&[Factor::Totp])),
            Err(StegoError::CorruptContainer(_))
        ));
        assert!(matches!(
            split_payload(&[], flags(&[Factor::Face])),
            Err(StegoError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_empty_message_after_parts() {
        let back = split_payload(&[2, 9, 9], flags(&[Factor::Totp])).unwrap();
        assert_eq!(back.totp_secret, Some(vec![9, 9]));
        assert!(back.message.is_empty());
    }

    #[test]
    fn test_wrap_plain() {
        let container = wrap(b"hello", FactorFlags::empty(), None).unwrap();
        assert_eq!(container.len(), HEADER_LEN + 5);
        let HeaderScan::Found(header) = ContainerHeader::parse(&container) else {
            panic!("header not found");
        };
        assert_eq!(header.payload_len, 5);
        assert_eq!(
            unwrap(&container[HEADER_LEN..], header.flags, None).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_wrap_encrypted_length_is_sealed_length() {
        let pw = flags(&[Factor::Password]);
        let container = wrap(b"hello", pw, Some("abc123")).unwrap();
        let HeaderScan::Found(header) = ContainerHeader::parse(&container) else {
            panic!("header not found");
        };
        assert_eq!(header.payload_len as usize, crypto::sealed_len(5));
        assert_ne!(&container[HEADER_LEN..], b"hello");

        let body = &container[HEADER_LEN..];
        assert_eq!(unwrap(body, pw, Some("abc123")).unwrap(), b"hello");
        assert!(matches!(
            unwrap(body, pw, Some("nope")),
            Err(StegoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrap_requires_password_when_flagged() {
        let pw = flags(&[Factor::Password]);
        assert!(matches!(
            wrap(b"x", pw, None),
            Err(StegoError::MissingFactor(Factor::Password))
        ));
        assert!(matches!(
            wrap(b"x", pw, Some("")),
            Err(StegoError::MissingFactor(Factor::Password))
        ));
    }

    #[test]
    fn test_total_bits() {
        assert_eq!(total_bits(5), 112);
    }
}
