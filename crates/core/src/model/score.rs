use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{QuizId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreCardError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("score ({score}) exceeds max score ({max_score})")]
    ScoreExceedsMax { score: u32, max_score: u32 },

    #[error("max score must be > 0")]
    ZeroMaxScore,
}

/// Final score for one user's completed attempt at one quiz.
///
/// This is the record shipped to the score store; the `(user_id, quiz_id)`
/// pair is the upsert key, so a repeat attempt replaces the previous row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    user_id: UserId,
    quiz_id: QuizId,
    quiz_title: String,
    score: u32,
    max_score: u32,
    completed_at: DateTime<Utc>,
}

impl ScoreCard {
    /// Creates a validated score card.
    ///
    /// # Errors
    ///
    /// Returns `ScoreCardError` if the title is blank, the max score is zero,
    /// or the score exceeds the max.
    pub fn new(
        user_id: UserId,
        quiz_id: QuizId,
        quiz_title: impl Into<String>,
        score: u32,
        max_score: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ScoreCardError> {
        let quiz_title = quiz_title.into();
        if quiz_title.trim().is_empty() {
            return Err(ScoreCardError::EmptyTitle);
        }
        if max_score == 0 {
            return Err(ScoreCardError::ZeroMaxScore);
        }
        if score > max_score {
            return Err(ScoreCardError::ScoreExceedsMax { score, max_score });
        }

        Ok(Self {
            user_id,
            quiz_id,
            quiz_title: quiz_title.trim().to_owned(),
            score,
            max_score,
            completed_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn quiz_title(&self) -> &str {
        &self.quiz_title
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_card_happy_path() {
        let card = ScoreCard::new(
            UserId::new("user-1"),
            QuizId::new(3),
            "CSS",
            7,
            10,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(card.user_id().as_str(), "user-1");
        assert_eq!(card.quiz_id(), QuizId::new(3));
        assert_eq!(card.quiz_title(), "CSS");
        assert_eq!(card.score(), 7);
        assert_eq!(card.max_score(), 10);
        assert_eq!(card.completed_at(), fixed_now());
    }

    #[test]
    fn score_card_rejects_score_above_max() {
        let err = ScoreCard::new(
            UserId::new("user-1"),
            QuizId::new(3),
            "CSS",
            11,
            10,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScoreCardError::ScoreExceedsMax {
                score: 11,
                max_score: 10
            }
        );
    }

    #[test]
    fn score_card_rejects_blank_title_and_zero_max() {
        let err = ScoreCard::new(
            UserId::new("u"),
            QuizId::new(1),
            "  ",
            0,
            10,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ScoreCardError::EmptyTitle);

        let err =
            ScoreCard::new(UserId::new("u"), QuizId::new(1), "JS", 0, 0, fixed_now()).unwrap_err();
        assert_eq!(err, ScoreCardError::ZeroMaxScore);
    }
}
