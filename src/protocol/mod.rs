//! # Container Protocol
//!
//! Header and payload layout for data hidden in a carrier, plus the
//! wrap/unwrap steps that apply password encryption.

pub mod container;

pub use container::{
    build_payload, split_payload, unwrap, wrap, ContainerHeader, HeaderScan, PayloadParts,
    HEADER_LEN, MAGIC,
};
