//! Core types for the Pizzatime bot.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod geo;
pub mod id;
pub mod price;

pub use email::{Email, EmailError};
pub use geo::Coordinates;
pub use id::*;
pub use price::Price;
