//! Reference prediction service: the streaming protocol plus the REST
//! digit endpoint, backed by random models.

pub mod model;
pub mod server;

use guessme_types::GuessmeError;

pub use model::{DigitModel, LabelModel, RandomDigitModel, RandomLabelModel, LABELS};
pub use server::{router, serve, spawn_local, MockState};

/// Bind and serve failures are operational, not predictor failures.
pub fn mock_error(message: impl Into<String>) -> GuessmeError {
    GuessmeError::Ops(message.into())
}
