use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use quizz_core::Clock;
use quizz_core::model::{
    QuestionId, QuizId, ScoreCard, ScoreFailure, SessionError, SessionState, UserId,
};
use storage::repository::{ScoreRepository, SessionCacheRepository, StorageError};

use crate::catalog::QuizSource;
use crate::error::SessionServiceError;
use crate::identity::IdentityProvider;

/// Logical key the whole session snapshot is cached under.
pub const SESSION_CACHE_KEY: &str = "quizz";

/// Outcome of the score-persistence side of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Upsert succeeded; the score is durably saved.
    Saved,
    /// No authenticated identity; the score stays local-only.
    SkippedNoIdentity,
    /// Upsert failed; the failure is mirrored in the session's `score_error`.
    Failed(ScoreFailure),
    /// The session was reset or re-seeded while the upsert was in flight, so
    /// the result was dropped.
    Superseded,
}

/// What a completed quiz produced: the local score plus the fate of the
/// remote submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub score: u32,
    pub max_score: u32,
    pub submission: SubmissionOutcome,
}

/// The injectable session container.
///
/// Wraps the synchronous `SessionState` machine and wires it to the async
/// collaborators: the catalog source, the score store, the durable local
/// cache, and the identity provider. Every mutation writes the new snapshot
/// through to the cache under [`SESSION_CACHE_KEY`], so an in-progress or
/// completed quiz survives a restart.
pub struct QuizSessionService {
    clock: Clock,
    state: Mutex<SessionState>,
    catalog: Arc<dyn QuizSource>,
    scores: Arc<dyn ScoreRepository>,
    session_cache: Arc<dyn SessionCacheRepository>,
    identity: Arc<dyn IdentityProvider>,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizSource>,
        scores: Arc<dyn ScoreRepository>,
        session_cache: Arc<dyn SessionCacheRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            clock,
            state: Mutex::new(SessionState::new()),
            catalog,
            scores,
            session_cache,
            identity,
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, SessionServiceError> {
        self.state
            .lock()
            .map_err(|_| SessionServiceError::StatePoisoned)
    }

    async fn persist(&self, snapshot: String) -> Result<(), SessionServiceError> {
        self.session_cache
            .save_snapshot(SESSION_CACHE_KEY, &snapshot)
            .await?;
        Ok(())
    }

    /// Cache write for the completion/submission path, where the in-memory
    /// transition has already happened and must stand whether or not the
    /// snapshot lands.
    async fn persist_best_effort(&self, snapshot: String) {
        if let Err(err) = self.persist(snapshot).await {
            tracing::warn!(error = %err, "session snapshot write failed, in-memory state stands");
        }
    }

    /// Current state snapshot for the rendering layer.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::StatePoisoned` if the state lock is
    /// poisoned.
    pub fn state(&self) -> Result<SessionState, SessionServiceError> {
        Ok(self.lock_state()?.clone())
    }

    // ─── Rehydration ───────────────────────────────────────────────────────────

    /// Restores the session from the durable cache, if a snapshot exists.
    ///
    /// A missing or undecodable snapshot is not fatal: the engine starts
    /// fresh and the bad snapshot is overwritten by the next mutation.
    /// Returns whether a snapshot was applied.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the cache cannot be read.
    pub async fn rehydrate(&self) -> Result<bool, SessionServiceError> {
        let Some(snapshot) = self
            .session_cache
            .load_snapshot(SESSION_CACHE_KEY)
            .await?
        else {
            return Ok(false);
        };

        match serde_json::from_str::<SessionState>(&snapshot) {
            Ok(mut restored) => {
                restored.normalize_after_rehydrate();
                *self.lock_state()? = restored;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!(error = %err, "cached session snapshot is unreadable, starting fresh");
                Ok(false)
            }
        }
    }

    // ─── Catalog ───────────────────────────────────────────────────────────────

    /// Refreshes the quiz catalog from the content provider.
    ///
    /// A fetch or decode failure is logged and leaves the previously loaded
    /// catalog untouched; callers retry by calling again. No automatic retry
    /// is performed.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` only for local failures (state lock,
    /// cache write); provider failures are swallowed by design.
    pub async fn fetch_quizzes(&self) -> Result<(), SessionServiceError> {
        let quizzes = match self.catalog.fetch_catalog().await {
            Ok(quizzes) => quizzes,
            Err(err) => {
                tracing::warn!(error = %err, "quiz catalog fetch failed, keeping previous catalog");
                return Ok(());
            }
        };

        let snapshot = {
            let mut state = self.lock_state()?;
            state.replace_catalog(quizzes);
            serde_json::to_string(&*state)?
        };
        self.persist(snapshot).await
    }

    // ─── Selection ─────────────────────────────────────────────────────────────

    /// Selects a quiz from the loaded catalog and seeds a fresh working copy
    /// of its questions. Re-selection discards any in-progress answers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuiz` via `SessionServiceError::Session`
    /// if the id is not in the catalog.
    pub async fn select_quizz(&self, quiz_id: QuizId) -> Result<(), SessionServiceError> {
        let snapshot = {
            let mut state = self.lock_state()?;
            state.select_quiz(quiz_id)?;
            serde_json::to_string(&*state)?
        };
        self.persist(snapshot).await
    }

    // ─── Answering & navigation ────────────────────────────────────────────────

    /// Records the user's answer for a question; returns whether it was
    /// correct.
    ///
    /// # Errors
    ///
    /// Propagates the state machine's rejections (unknown question,
    /// re-answer, completed session) plus cache write failures.
    pub async fn select_answer(
        &self,
        question_id: QuestionId,
        selected: &str,
    ) -> Result<bool, SessionServiceError> {
        let (correct, snapshot) = {
            let mut state = self.lock_state()?;
            let correct = state.select_answer(question_id, selected)?;
            (correct, serde_json::to_string(&*state)?)
        };
        self.persist(snapshot).await?;
        Ok(correct)
    }

    /// Advances to the next question; no-op at the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` for state lock or cache write failures.
    pub async fn go_next_question(&self) -> Result<bool, SessionServiceError> {
        let (moved, snapshot) = {
            let mut state = self.lock_state()?;
            let moved = state.go_next_question();
            (moved, serde_json::to_string(&*state)?)
        };
        if moved {
            self.persist(snapshot).await?;
        }
        Ok(moved)
    }

    /// Moves back to the previous question; no-op at the first one.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` for state lock or cache write failures.
    pub async fn go_previous_question(&self) -> Result<bool, SessionServiceError> {
        let (moved, snapshot) = {
            let mut state = self.lock_state()?;
            let moved = state.go_previous_question();
            (moved, serde_json::to_string(&*state)?)
        };
        if moved {
            self.persist(snapshot).await?;
        }
        Ok(moved)
    }

    // ─── Completion & score persistence ────────────────────────────────────────

    /// Completes the attempt and submits the score.
    ///
    /// The local transition (scoring, terminal `Completed` phase) happens
    /// synchronously and is never rolled back; the remote upsert runs after
    /// it and reports its fate in the returned outcome. Without an
    /// authenticated identity the submission is skipped entirely.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` via
    /// `SessionServiceError::Session` on a second completion; submission
    /// failures are not errors here, they surface in the outcome and in
    /// `score_error`. A cache-write failure after the local transition is
    /// logged, not propagated, since the completion already stands.
    pub async fn on_complete_questions(&self) -> Result<CompletionOutcome, SessionServiceError> {
        let (score, max_score, snapshot) = {
            let mut state = self.lock_state()?;
            let score = state.complete_questions()?;
            (score, state.max_score(), serde_json::to_string(&*state)?)
        };
        self.persist_best_effort(snapshot).await;

        let submission = self.submit_score().await?;
        Ok(CompletionOutcome {
            score,
            max_score,
            submission,
        })
    }

    /// Submits the completed score to the remote store.
    ///
    /// Exposed separately so the surrounding UI can offer a manual retry
    /// after a failed submission. At most one submission is in flight at a
    /// time, and a result arriving after `reset`/re-selection is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` or
    /// `SessionError::SubmissionInFlight` via `SessionServiceError::Session`;
    /// upsert failures are reported through the outcome instead. Cache-write
    /// failures are logged, not propagated; every exit after the guard is
    /// taken releases it again, so a later retry is never blocked.
    pub async fn submit_score(&self) -> Result<SubmissionOutcome, SessionServiceError> {
        let Some(user) = self.identity.current_user() else {
            tracing::debug!("no authenticated identity, score stays local-only");
            return Ok(SubmissionOutcome::SkippedNoIdentity);
        };

        let (epoch, card, snapshot) = {
            let mut state = self.lock_state()?;
            let epoch = state.begin_score_submission()?;
            match build_submission(&state, user, self.clock.now()) {
                Ok((card, snapshot)) => (epoch, card, snapshot),
                Err(err) => {
                    // roll the guard back before surfacing the error
                    state.finish_score_submission(epoch, None);
                    return Err(err);
                }
            }
        };
        self.persist_best_effort(snapshot).await;

        let failure = match self.scores.upsert_score(&card).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(error = %err, "score submission failed, local completion stands");
                Some(submission_failure(&err))
            }
        };

        let (applied, snapshot) = {
            let mut state = self.lock_state()?;
            let applied = state.finish_score_submission(epoch, failure.clone());
            (applied, serde_json::to_string(&*state)?)
        };
        self.persist_best_effort(snapshot).await;

        if !applied {
            return Ok(SubmissionOutcome::Superseded);
        }
        Ok(match failure {
            None => SubmissionOutcome::Saved,
            Some(failure) => SubmissionOutcome::Failed(failure),
        })
    }

    // ─── Reset ─────────────────────────────────────────────────────────────────

    /// Clears quiz-specific state while keeping the loaded catalog.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError` for state lock or cache write failures.
    pub async fn reset(&self) -> Result<(), SessionServiceError> {
        let snapshot = {
            let mut state = self.lock_state()?;
            state.reset();
            serde_json::to_string(&*state)?
        };
        self.persist(snapshot).await
    }
}

fn build_submission(
    state: &SessionState,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<(ScoreCard, String), SessionServiceError> {
    let quiz = state.selected_quiz().ok_or(SessionError::NoQuizSelected)?;
    let card = ScoreCard::new(
        user,
        quiz.id(),
        quiz.title(),
        state.score(),
        state.max_score(),
        now,
    )?;
    let snapshot = serde_json::to_string(state)?;
    Ok((card, snapshot))
}

fn submission_failure(err: &StorageError) -> ScoreFailure {
    match err {
        StorageError::Connection(msg) => ScoreFailure::Network(msg.clone()),
        StorageError::Conflict => ScoreFailure::Rejected(409),
        other => ScoreFailure::Storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_submission_failures() {
        assert_eq!(
            submission_failure(&StorageError::Connection("timeout".into())),
            ScoreFailure::Network("timeout".into())
        );
        assert_eq!(
            submission_failure(&StorageError::Conflict),
            ScoreFailure::Rejected(409)
        );
        assert!(matches!(
            submission_failure(&StorageError::Serialization("bad row".into())),
            ScoreFailure::Storage(_)
        ));
    }
}
