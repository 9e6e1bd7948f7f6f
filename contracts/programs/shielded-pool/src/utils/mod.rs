//! Utility modules
//!
//! Hashing, byte parsing and the asset transfer seam.

pub mod crypto;
pub mod parsing;
pub mod token;

pub use crypto::*;
pub use parsing::*;
pub use token::*;
