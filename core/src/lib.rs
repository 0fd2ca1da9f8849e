//! Core addressing and encoding primitives of the xstore storage layer.
//!
//! This crate defines how stored tree nodes are located (a packed 64-bit [`address`]) and how
//! integers are laid out on disk ([`varint`]). Both are pure and stateless, and safe to use from
//! any number of threads.
//!
//! The crate does not require the standard library, but does require Rust's alloc crate.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

pub mod address;
pub mod error;
pub mod varint;

pub use address::StorageAddress;
pub use error::DecodeError;
pub use varint::{ByteReader, ByteWriter};
