//! Turn lifecycle state machine with validated transitions.
//!
//! Init -> EnsureConversation -> LoadHistory -> GenerateSql
//!   -> ExecuteQuery | SkipQuery -> StreamAnswer -> Persist -> Done
//!
//! Error is reachable from every non-terminal state.

use tracing::debug;

use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnState {
    Init,
    EnsureConversation,
    LoadHistory,
    GenerateSql,
    ExecuteQuery,
    SkipQuery,
    StreamAnswer,
    Persist,
    Done,
    Error,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Init => "init",
            TurnState::EnsureConversation => "ensure_conversation",
            TurnState::LoadHistory => "load_history",
            TurnState::GenerateSql => "generate_sql",
            TurnState::ExecuteQuery => "execute_query",
            TurnState::SkipQuery => "skip_query",
            TurnState::StreamAnswer => "stream_answer",
            TurnState::Persist => "persist",
            TurnState::Done => "done",
            TurnState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Error)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate that a state transition is allowed.
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), ChatError> {
    let valid = match (from, to) {
        (from, TurnState::Error) => !from.is_terminal(),
        (TurnState::Init, TurnState::EnsureConversation)
        | (TurnState::EnsureConversation, TurnState::LoadHistory)
        | (TurnState::LoadHistory, TurnState::GenerateSql)
        | (TurnState::GenerateSql, TurnState::ExecuteQuery)
        | (TurnState::GenerateSql, TurnState::SkipQuery)
        | (TurnState::ExecuteQuery, TurnState::StreamAnswer)
        | (TurnState::SkipQuery, TurnState::StreamAnswer)
        | (TurnState::StreamAnswer, TurnState::Persist)
        | (TurnState::Persist, TurnState::Done) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}

/// Current state of one turn plus the path it took.
#[derive(Debug, Clone)]
pub struct TurnTracker {
    conversation_id: String,
    state: TurnState,
    path: Vec<TurnState>,
}

impl TurnTracker {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state: TurnState::Init,
            path: vec![TurnState::Init],
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Every state visited so far, starting with `Init`.
    pub fn path(&self) -> &[TurnState] {
        &self.path
    }

    pub fn advance(&mut self, to: TurnState) -> Result<(), ChatError> {
        validate_transition(self.state, to)?;
        debug!(
            conversation_id = %self.conversation_id,
            from = %self.state,
            to = %to,
            "Turn state transition"
        );
        self.state = to;
        self.path.push(to);
        Ok(())
    }

    /// Move to `Error`. A no-op once the turn is already terminal.
    pub fn fail(&mut self) {
        if self.advance(TurnState::Error).is_err() {
            debug!(
                conversation_id = %self.conversation_id,
                state = %self.state,
                "Turn already terminal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HAPPY_PATH: [TurnState; 7] = [
        TurnState::EnsureConversation,
        TurnState::LoadHistory,
        TurnState::GenerateSql,
        TurnState::ExecuteQuery,
        TurnState::StreamAnswer,
        TurnState::Persist,
        TurnState::Done,
    ];

    #[test]
    fn test_happy_path_transitions() {
        let mut tracker = TurnTracker::new("c1");
        for to in HAPPY_PATH {
            tracker.advance(to).unwrap();
        }
        assert_eq!(tracker.state(), TurnState::Done);
        assert_eq!(tracker.path().len(), 8);
    }

    #[test]
    fn test_skip_query_branch() {
        assert!(validate_transition(TurnState::GenerateSql, TurnState::SkipQuery).is_ok());
        assert!(validate_transition(TurnState::SkipQuery, TurnState::StreamAnswer).is_ok());
        assert!(validate_transition(TurnState::SkipQuery, TurnState::ExecuteQuery).is_err());
    }

    #[test]
    fn test_error_reachable_from_every_non_terminal_state() {
        for from in [
            TurnState::Init,
            TurnState::EnsureConversation,
            TurnState::LoadHistory,
            TurnState::GenerateSql,
            TurnState::ExecuteQuery,
            TurnState::SkipQuery,
            TurnState::StreamAnswer,
            TurnState::Persist,
        ] {
            assert!(validate_transition(from, TurnState::Error).is_ok(), "{from}");
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(validate_transition(TurnState::Done, TurnState::Error).is_err());
        assert!(validate_transition(TurnState::Error, TurnState::Error).is_err());
        assert!(validate_transition(TurnState::Error, TurnState::Done).is_err());
        assert!(validate_transition(TurnState::Done, TurnState::Init).is_err());
    }

    #[test]
    fn test_cannot_skip_steps() {
        assert!(validate_transition(TurnState::Init, TurnState::GenerateSql).is_err());
        assert!(validate_transition(TurnState::LoadHistory, TurnState::StreamAnswer).is_err());
        assert!(validate_transition(TurnState::StreamAnswer, TurnState::Done).is_err());
        assert!(validate_transition(TurnState::ExecuteQuery, TurnState::Persist).is_err());
    }

    #[test]
    fn test_fail_after_done_is_noop() {
        let mut tracker = TurnTracker::new("c1");
        for to in HAPPY_PATH {
            tracker.advance(to).unwrap();
        }
        tracker.fail();
        assert_eq!(tracker.state(), TurnState::Done);
    }

    #[test]
    fn test_fail_from_middle() {
        let mut tracker = TurnTracker::new("c1");
        tracker.advance(TurnState::EnsureConversation).unwrap();
        tracker.fail();
        assert_eq!(tracker.state(), TurnState::Error);
        assert_eq!(
            tracker.path(),
            &[TurnState::Init, TurnState::EnsureConversation, TurnState::Error]
        );
    }
}
