//! Transfer Core Types
//!
//! This crate defines the fundamental types shared by the relay and the HTTP
//! transport: session tokens, roles, session states and the error taxonomy.

mod config;
mod error;
mod token;
mod types;

pub use config::*;
pub use error::*;
pub use token::*;
pub use types::*;
