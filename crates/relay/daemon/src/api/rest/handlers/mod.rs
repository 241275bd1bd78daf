//! API request handlers

mod health;
mod procedures;

pub use health::*;
pub use procedures::*;
