//! Hashing primitives for the content directory.
//!
//! Provides domain-separated BLAKE3 hashing for text submitted to `Hash`-typed
//! properties and for the canonical encoding of unique property values.
//!
//! All crypto operations wrap established libraries. There is no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
