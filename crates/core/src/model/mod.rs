mod ids;
mod quiz;
mod score;
mod session;

pub use ids::{ParseIdError, QuestionId, QuizId, UserId};
pub use quiz::{Question, Quiz, QuizError};
pub use score::{ScoreCard, ScoreCardError};
pub use session::{ScoreFailure, SessionError, SessionPhase, SessionState};
