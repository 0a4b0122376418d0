//! Session tokens and their generation
//!
//! A token is the only thing a producer and a consumer share. It is handed out
//! by `/newsession` and presented on both attach requests, so it must be
//! unguessable: tokens are read from the OS CSPRNG and encoded as URL-safe
//! base64 so they can be embedded in a path segment as-is.

use std::borrow::Borrow;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::{Result, TransferError};

/// Default number of random bytes in a generated token
pub const DEFAULT_TOKEN_BYTES: usize = 48;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh session tokens
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<Token>;
}

/// Token generator backed by the operating system's CSPRNG
#[derive(Debug, Clone, Copy)]
pub struct RandomTokenGenerator {
    bytes: usize,
}

impl RandomTokenGenerator {
    /// Create a generator that draws `bytes` random bytes per token
    pub fn new(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Number of random bytes behind each token
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BYTES)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Result<Token> {
        let mut buf = vec![0u8; self.bytes];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| TransferError::TokenGeneration(e.to_string()))?;
        Ok(Token(URL_SAFE.encode(&buf)))
    }
}
