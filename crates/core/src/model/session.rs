use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};
use crate::model::quiz::{Question, Quiz};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no quiz selected")]
    NoQuizSelected,

    #[error("quiz {0} is not in the loaded catalog")]
    UnknownQuiz(QuizId),

    #[error("question {0} is not part of the current quiz")]
    UnknownQuestion(QuestionId),

    #[error("question {0} has already been answered")]
    AlreadyAnswered(QuestionId),

    #[error("quiz already completed")]
    AlreadyCompleted,

    #[error("quiz not completed yet")]
    NotCompleted,

    #[error("a score submission is already in flight")]
    SubmissionInFlight,
}

/// Why a score submission failed.
///
/// Kept inside session state so the UI can distinguish "scored locally" from
/// "durably saved"; local completion is never rolled back on failure.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ScoreFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("score store rejected the write with status {0}")]
    Rejected(u16),

    #[error("storage error: {0}")]
    Storage(String),
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Coarse lifecycle of a session: `Idle` → `InProgress` → `Completed`,
/// with `reset` as the only way back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    InProgress,
    Completed,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Single source of truth for one quiz attempt.
///
/// Holds the loaded catalog, the selected quiz, an independent working copy
/// of its questions, the current-question pointer, and the scoring/submission
/// flags. Every operation is a synchronous transition; the async collaborators
/// (catalog fetch, score upsert) live in the services layer and merge their
/// results back through the epoch-guarded submission methods.
///
/// The whole state serializes to one snapshot for the durable local cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    quizzes: Vec<Quiz>,
    selected_quiz: Option<Quiz>,
    questions: Vec<Question>,
    current_question_index: usize,
    score: u32,
    has_completed_all: bool,
    is_saving_score: bool,
    score_error: Option<ScoreFailure>,
    epoch: u64,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Accessors
    #[must_use]
    pub fn quizzes(&self) -> &[Quiz] {
        &self.quizzes
    }

    #[must_use]
    pub fn selected_quiz(&self) -> Option<&Quiz> {
        self.selected_quiz.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Count of correctly answered questions. Only meaningful once
    /// `has_completed_all` is true.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Number of questions in the working copy.
    #[must_use]
    pub fn max_score(&self) -> u32 {
        u32::try_from(self.questions.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn has_completed_all(&self) -> bool {
        self.has_completed_all
    }

    #[must_use]
    pub fn is_saving_score(&self) -> bool {
        self.is_saving_score
    }

    #[must_use]
    pub fn score_error(&self) -> Option<&ScoreFailure> {
        self.score_error.as_ref()
    }

    /// Identity of the current attempt. Bumped by `select_quiz` and `reset`,
    /// so a submission result issued for a superseded attempt can be detected
    /// and dropped.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.selected_quiz.is_none() {
            SessionPhase::Idle
        } else if self.has_completed_all {
            SessionPhase::Completed
        } else {
            SessionPhase::InProgress
        }
    }

    // ─── Catalog ───────────────────────────────────────────────────────────────

    /// Replaces the loaded catalog with a freshly fetched one and clears the
    /// completion flag. A failed fetch never reaches this method, so a stale
    /// catalog survives untouched.
    pub fn replace_catalog(&mut self, quizzes: Vec<Quiz>) {
        self.quizzes = quizzes;
        self.has_completed_all = false;
    }

    // ─── Selection ─────────────────────────────────────────────────────────────

    /// Selects a quiz from the catalog and seeds the working question copy.
    ///
    /// Re-selection mid-quiz is an explicit discard: any in-progress answers
    /// are dropped and the attempt epoch is bumped, so an in-flight score
    /// submission for the previous attempt can no longer apply.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuiz` if the id is not in the catalog.
    pub fn select_quiz(&mut self, quiz_id: QuizId) -> Result<(), SessionError> {
        let quiz = self
            .quizzes
            .iter()
            .find(|q| q.id() == quiz_id)
            .ok_or(SessionError::UnknownQuiz(quiz_id))?
            .clone();

        self.questions = quiz.fresh_questions();
        self.selected_quiz = Some(quiz);
        self.current_question_index = 0;
        self.score = 0;
        self.has_completed_all = false;
        self.is_saving_score = false;
        self.score_error = None;
        self.epoch += 1;
        Ok(())
    }

    // ─── Answering ─────────────────────────────────────────────────────────────

    /// Records the user's answer for a question and judges it against the
    /// answer key. Returns whether the answer was correct.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuizSelected` outside a session,
    /// `SessionError::AlreadyCompleted` after completion,
    /// `SessionError::UnknownQuestion` for an id outside the working copy, and
    /// `SessionError::AlreadyAnswered` on a re-answer attempt; there is no
    /// "unanswer" operation.
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        selected: &str,
    ) -> Result<bool, SessionError> {
        if self.selected_quiz.is_none() {
            return Err(SessionError::NoQuizSelected);
        }
        if self.has_completed_all {
            return Err(SessionError::AlreadyCompleted);
        }
        let question = self
            .questions
            .iter_mut()
            .find(|q| q.id() == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        if question.is_answered() {
            return Err(SessionError::AlreadyAnswered(question_id));
        }

        Ok(question.record_answer(selected))
    }

    // ─── Navigation ────────────────────────────────────────────────────────────

    /// Advances the current-question pointer. No-op at the last question; it
    /// never wraps and never triggers completion.
    pub fn go_next_question(&mut self) -> bool {
        let next = self.current_question_index + 1;
        if next < self.questions.len() {
            self.current_question_index = next;
            true
        } else {
            false
        }
    }

    /// Moves the current-question pointer back. No-op at the first question.
    pub fn go_previous_question(&mut self) -> bool {
        if self.current_question_index > 0 {
            self.current_question_index -= 1;
            true
        } else {
            false
        }
    }

    // ─── Completion ────────────────────────────────────────────────────────────

    /// Completes the attempt: scores the working copy (unanswered questions
    /// count as incorrect), rewinds the pointer, and enters the terminal
    /// `Completed` phase. Returns the computed score.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuizSelected` outside a session and
    /// `SessionError::AlreadyCompleted` on a second call; `reset` is the only
    /// way out of the completed phase.
    pub fn complete_questions(&mut self) -> Result<u32, SessionError> {
        if self.selected_quiz.is_none() {
            return Err(SessionError::NoQuizSelected);
        }
        if self.has_completed_all {
            return Err(SessionError::AlreadyCompleted);
        }

        let correct = self
            .questions
            .iter()
            .filter(|q| q.is_correct_user_answer() == Some(true))
            .count();
        self.score = u32::try_from(correct).unwrap_or(u32::MAX);
        self.current_question_index = 0;
        self.has_completed_all = true;
        Ok(self.score)
    }

    // ─── Score submission guard ────────────────────────────────────────────────

    /// Marks a score submission as in flight and returns the attempt epoch
    /// the caller must present when merging the result back.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` before completion and
    /// `SessionError::SubmissionInFlight` while another submission is pending.
    pub fn begin_score_submission(&mut self) -> Result<u64, SessionError> {
        if !self.has_completed_all {
            return Err(SessionError::NotCompleted);
        }
        if self.is_saving_score {
            return Err(SessionError::SubmissionInFlight);
        }

        self.is_saving_score = true;
        self.score_error = None;
        Ok(self.epoch)
    }

    /// Merges a submission result back into the session.
    ///
    /// Applies only if `epoch` still identifies the current attempt; a result
    /// arriving after `reset` or a re-selection is dropped and `false` is
    /// returned. Local completion stands either way.
    pub fn finish_score_submission(&mut self, epoch: u64, failure: Option<ScoreFailure>) -> bool {
        if epoch != self.epoch {
            return false;
        }

        self.is_saving_score = false;
        self.score_error = failure;
        true
    }

    // ─── Reset ─────────────────────────────────────────────────────────────────

    /// Clears all quiz-specific state while preserving the loaded catalog.
    pub fn reset(&mut self) {
        self.selected_quiz = None;
        self.questions.clear();
        self.current_question_index = 0;
        self.score = 0;
        self.has_completed_all = false;
        self.is_saving_score = false;
        self.score_error = None;
        self.epoch += 1;
    }

    // ─── Rehydration ───────────────────────────────────────────────────────────

    /// Normalizes a snapshot loaded from the durable cache.
    ///
    /// An in-flight submission cannot survive a process restart, and the
    /// pointer is clamped back into bounds in case the snapshot predates a
    /// catalog change.
    pub fn normalize_after_rehydrate(&mut self) {
        self.is_saving_score = false;
        if self.questions.is_empty() {
            self.current_question_index = 0;
        } else if self.current_question_index >= self.questions.len() {
            self.current_question_index = self.questions.len() - 1;
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;

    fn build_question(id: u64, answer: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Prompt {id}"),
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            answer,
        )
        .unwrap()
    }

    fn build_quiz(id: u64, answers: &[&str]) -> Quiz {
        let questions = answers
            .iter()
            .enumerate()
            .map(|(i, answer)| build_question(i as u64 + 1, answer))
            .collect();
        Quiz::new(QuizId::new(id), format!("Quiz {id}"), "icon.svg", questions).unwrap()
    }

    fn state_with_quiz(answers: &[&str]) -> SessionState {
        let mut state = SessionState::new();
        state.replace_catalog(vec![build_quiz(1, answers)]);
        state.select_quiz(QuizId::new(1)).unwrap();
        state
    }

    #[test]
    fn starts_idle_and_empty() {
        let state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.quizzes().is_empty());
        assert_eq!(state.current_question_index(), 0);
        assert!(!state.has_completed_all());
    }

    #[test]
    fn select_quiz_seeds_independent_working_copy() {
        let mut state = state_with_quiz(&["A", "B"]);
        assert_eq!(state.phase(), SessionPhase::InProgress);
        assert_eq!(state.questions().len(), 2);

        state.select_answer(QuestionId::new(1), "A").unwrap();

        // the catalog entry never sees the session's judgment
        assert!(state.questions()[0].is_answered());
        assert!(!state.quizzes()[0].questions()[0].is_answered());
    }

    #[test]
    fn select_quiz_rejects_id_outside_catalog() {
        let mut state = SessionState::new();
        state.replace_catalog(vec![build_quiz(1, &["A"; 2])]);
        let err = state.select_quiz(QuizId::new(9)).unwrap_err();
        assert_eq!(err, SessionError::UnknownQuiz(QuizId::new(9)));
    }

    #[test]
    fn reselection_discards_progress() {
        let mut state = state_with_quiz(&["A", "B"]);
        state.select_answer(QuestionId::new(1), "A").unwrap();
        state.go_next_question();
        let epoch_before = state.epoch();

        state.select_quiz(QuizId::new(1)).unwrap();

        assert!(!state.questions()[0].is_answered());
        assert_eq!(state.current_question_index(), 0);
        assert!(state.epoch() > epoch_before);
    }

    #[test]
    fn select_answer_judges_against_key() {
        let mut state = state_with_quiz(&["A", "B"]);
        assert!(state.select_answer(QuestionId::new(1), "A").unwrap());
        assert!(!state.select_answer(QuestionId::new(2), "C").unwrap());
        assert_eq!(
            state.questions()[1].user_selected_answer(),
            Some("C")
        );
        assert_eq!(state.questions()[1].is_correct_user_answer(), Some(false));
    }

    #[test]
    fn select_answer_rejects_unknown_question_and_reanswer() {
        let mut state = state_with_quiz(&["A", "B"]);

        let err = state.select_answer(QuestionId::new(99), "A").unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(QuestionId::new(99)));

        state.select_answer(QuestionId::new(1), "B").unwrap();
        let err = state.select_answer(QuestionId::new(1), "A").unwrap_err();
        assert_eq!(err, SessionError::AlreadyAnswered(QuestionId::new(1)));
        // first judgment stands
        assert_eq!(state.questions()[0].user_selected_answer(), Some("B"));
    }

    #[test]
    fn select_answer_requires_a_selected_quiz() {
        let mut state = SessionState::new();
        let err = state.select_answer(QuestionId::new(1), "A").unwrap_err();
        assert_eq!(err, SessionError::NoQuizSelected);
    }

    #[test]
    fn navigation_stays_within_bounds() {
        let mut state = state_with_quiz(&["A", "B", "C"]);

        assert!(!state.go_previous_question());
        assert_eq!(state.current_question_index(), 0);

        assert!(state.go_next_question());
        assert!(state.go_next_question());
        assert_eq!(state.current_question_index(), 2);

        assert!(!state.go_next_question());
        assert_eq!(state.current_question_index(), 2);

        assert!(state.go_previous_question());
        assert_eq!(state.current_question_index(), 1);
    }

    #[test]
    fn completion_scores_answered_questions_only() {
        let mut state = state_with_quiz(&["A", "B", "C"]);
        state.select_answer(QuestionId::new(1), "A").unwrap();
        state.select_answer(QuestionId::new(2), "D").unwrap();
        // question 3 left unanswered, counts as incorrect

        let score = state.complete_questions().unwrap();
        assert_eq!(score, 1);
        assert_eq!(state.score(), 1);
        assert_eq!(state.max_score(), 3);
        assert!(state.has_completed_all());
        assert_eq!(state.current_question_index(), 0);
        assert_eq!(state.phase(), SessionPhase::Completed);
    }

    #[test]
    fn two_question_scenario_scores_one() {
        let mut state = state_with_quiz(&["A", "B"]);
        state.select_answer(QuestionId::new(1), "A").unwrap();
        state.select_answer(QuestionId::new(2), "C").unwrap();

        assert_eq!(state.complete_questions().unwrap(), 1);
        assert!(state.has_completed_all());
    }

    #[test]
    fn completion_is_terminal_until_reset() {
        let mut state = state_with_quiz(&["A"; 2]);
        state.complete_questions().unwrap();

        assert_eq!(
            state.complete_questions().unwrap_err(),
            SessionError::AlreadyCompleted
        );
        assert_eq!(
            state.select_answer(QuestionId::new(1), "A").unwrap_err(),
            SessionError::AlreadyCompleted
        );

        state.reset();
        assert_eq!(state.phase(), SessionPhase::Idle);
    }

    #[test]
    fn reset_preserves_catalog_and_is_idempotent() {
        let mut state = state_with_quiz(&["A", "B"]);
        state.select_answer(QuestionId::new(1), "A").unwrap();
        state.complete_questions().unwrap();

        state.reset();
        assert_eq!(state.quizzes().len(), 1);
        assert!(state.selected_quiz().is_none());
        assert!(state.questions().is_empty());
        assert!(!state.has_completed_all());
        assert!(state.score_error().is_none());

        // reset + reselect reproduces a fresh attempt
        state.select_quiz(QuizId::new(1)).unwrap();
        let fresh = {
            let mut s = SessionState::new();
            s.replace_catalog(state.quizzes().to_vec());
            s.select_quiz(QuizId::new(1)).unwrap();
            s
        };
        assert_eq!(state.questions(), fresh.questions());
        assert_eq!(state.current_question_index(), fresh.current_question_index());
        assert_eq!(state.score(), fresh.score());
    }

    #[test]
    fn replace_catalog_clears_completion_flag() {
        let mut state = state_with_quiz(&["A"; 2]);
        state.complete_questions().unwrap();

        state.replace_catalog(vec![build_quiz(2, &["B"; 2])]);
        assert!(!state.has_completed_all());
        assert_eq!(state.quizzes()[0].id(), QuizId::new(2));
    }

    #[test]
    fn submission_guard_allows_one_in_flight() {
        let mut state = state_with_quiz(&["A"; 2]);
        assert_eq!(
            state.begin_score_submission().unwrap_err(),
            SessionError::NotCompleted
        );

        state.complete_questions().unwrap();
        let epoch = state.begin_score_submission().unwrap();
        assert!(state.is_saving_score());
        assert_eq!(
            state.begin_score_submission().unwrap_err(),
            SessionError::SubmissionInFlight
        );

        assert!(state.finish_score_submission(epoch, None));
        assert!(!state.is_saving_score());
        assert!(state.score_error().is_none());
    }

    #[test]
    fn failed_submission_surfaces_error_without_rollback() {
        let mut state = state_with_quiz(&["A"; 2]);
        state.complete_questions().unwrap();
        let epoch = state.begin_score_submission().unwrap();

        let failure = ScoreFailure::Network("connection refused".into());
        assert!(state.finish_score_submission(epoch, Some(failure.clone())));
        assert_eq!(state.score_error(), Some(&failure));
        assert!(state.has_completed_all());
    }

    #[test]
    fn stale_submission_result_is_dropped_after_reset() {
        let mut state = state_with_quiz(&["A"; 2]);
        state.complete_questions().unwrap();
        let epoch = state.begin_score_submission().unwrap();

        state.reset();
        let applied =
            state.finish_score_submission(epoch, Some(ScoreFailure::Rejected(500)));
        assert!(!applied);
        assert!(!state.is_saving_score());
        assert!(state.score_error().is_none());
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let mut state = state_with_quiz(&["A", "B"]);
        state.select_answer(QuestionId::new(1), "A").unwrap();
        state.go_next_question();

        let json = serde_json::to_string(&state).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn rehydration_clears_in_flight_submission() {
        let mut state = state_with_quiz(&["A"; 2]);
        state.complete_questions().unwrap();
        state.begin_score_submission().unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let mut restored: SessionState = serde_json::from_str(&json).unwrap();
        restored.normalize_after_rehydrate();

        assert!(!restored.is_saving_score());
        assert!(restored.has_completed_all());
    }
}
