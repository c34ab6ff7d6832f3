use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("duplicate question id {0} within a quiz")]
    DuplicateQuestionId(QuestionId),

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question needs at least two choices, got {0}")]
    TooFewChoices(usize),

    #[error("answer key is not one of the question's choices")]
    AnswerNotInChoices,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question with a fixed answer key.
///
/// `user_selected_answer` and `is_correct_user_answer` stay unset until the
/// user submits an answer within a session; the catalog copy never carries
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    choices: Vec<String>,
    answer: String,
    user_selected_answer: Option<String>,
    is_correct_user_answer: Option<bool>,
}

impl Question {
    /// Creates a new, unanswered question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyPrompt` for a blank prompt,
    /// `QuizError::TooFewChoices` for fewer than two choices, and
    /// `QuizError::AnswerNotInChoices` if the answer key is absent from the
    /// choice list.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        choices: Vec<String>,
        answer: impl Into<String>,
    ) -> Result<Self, QuizError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuizError::EmptyPrompt);
        }
        if choices.len() < 2 {
            return Err(QuizError::TooFewChoices(choices.len()));
        }
        let answer = answer.into();
        if !choices.iter().any(|c| c == &answer) {
            return Err(QuizError::AnswerNotInChoices);
        }

        Ok(Self {
            id,
            prompt: prompt.trim().to_owned(),
            choices,
            answer,
            user_selected_answer: None,
            is_correct_user_answer: None,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn user_selected_answer(&self) -> Option<&str> {
        self.user_selected_answer.as_deref()
    }

    #[must_use]
    pub fn is_correct_user_answer(&self) -> Option<bool> {
        self.is_correct_user_answer
    }

    /// True once the user has submitted an answer for this question.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.user_selected_answer.is_some()
    }

    /// Records the user's answer and judges it against the answer key.
    ///
    /// Returns whether the selected answer was correct. The judgment replaces
    /// the question's record wholesale; callers enforce the
    /// one-answer-per-question rule.
    pub(crate) fn record_answer(&mut self, selected: impl Into<String>) -> bool {
        let selected = selected.into();
        let is_correct = selected == self.answer;
        self.user_selected_answer = Some(selected);
        self.is_correct_user_answer = Some(is_correct);
        is_correct
    }

    /// Returns a copy with all judgment fields cleared.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        Self {
            user_selected_answer: None,
            is_correct_user_answer: None,
            ..self.clone()
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A named, ordered collection of questions with a fixed answer key.
///
/// Immutable once fetched from the content provider; sessions work on an
/// independent copy of the question list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    title: String,
    icon: String,
    questions: Vec<Question>,
}

impl Quiz {
    /// Creates a new Quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` for a blank title,
    /// `QuizError::NoQuestions` for an empty question list, and
    /// `QuizError::DuplicateQuestionId` if two questions share an id.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        icon: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        let mut seen = HashSet::new();
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestionId(question.id()));
            }
        }

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            icon: icon.into(),
            questions,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn icon(&self) -> &str {
        &self.icon
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Deep, independent copy of the question list with all judgment fields
    /// cleared. Mutating the result never touches the catalog entry.
    #[must_use]
    pub fn fresh_questions(&self) -> Vec<Question> {
        self.questions.iter().map(Question::fresh_copy).collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
