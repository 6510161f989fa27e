//! Common types shared by the pitch farmer crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
