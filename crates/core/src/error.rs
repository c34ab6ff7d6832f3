use thiserror::Error;

use crate::model::{QuizError, ScoreCardError, SessionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Score(#[from] ScoreCardError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
