//! Shared domain types for the Guessme project.

pub mod config;
pub mod events;
pub mod game;
pub mod geometry;
pub mod prediction;
pub mod protocol;
pub mod time_control;

mod errors;

pub use errors::{GuessmeError, Result};
