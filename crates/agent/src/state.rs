//! Per-turn loop state and its phase machine.

use forgeloop_core::ToolCallResponse;
use tracing::debug;

/// `Idle → Requesting → Streaming → (ToolExecuting → Requesting)* →
/// Finalizing → Idle`, with `Cancelled` reachable from any active phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Idle,
    Requesting,
    Streaming,
    ToolExecuting,
    Finalizing,
    Cancelled,
}

impl LoopPhase {
    fn can_enter(self, next: LoopPhase) -> bool {
        use LoopPhase::*;
        match (self, next) {
            (Idle, Requesting) => true,
            (Requesting, Streaming | Finalizing) => true,
            (Streaming, ToolExecuting | Finalizing) => true,
            (ToolExecuting, Requesting | Finalizing) => true,
            (Finalizing, Idle) => true,
            (Cancelled, Finalizing | Idle) => true,
            (Idle, Cancelled) => false,
            (_, Cancelled) => true,
            _ => false,
        }
    }
}

/// Why a turn stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without calling tools.
    Answered,
    /// `finish_task` was called.
    TaskCompleted,
    /// `ask_question` was called; the next user message answers it.
    AwaitingUser,
    IterationLimit,
    Cancelled,
    /// The transport failed; carries the user-facing message.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct AgentLoopState {
    pub iteration: u32,
    pub pending_tool_calls: Vec<ToolCallResponse>,
    pub cancelled: bool,
    pub task_completed: bool,
    pub awaiting_user: bool,
    phase: LoopPhase,
}

impl AgentLoopState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Reset for a new user turn and enter `Requesting`.
    pub fn begin_turn(&mut self) {
        self.iteration = 0;
        self.pending_tool_calls.clear();
        self.cancelled = false;
        self.task_completed = false;
        self.awaiting_user = false;
        self.phase = LoopPhase::Idle;
        self.enter(LoopPhase::Requesting);
    }

    /// Move to `next`. Invalid transitions are logged and ignored.
    pub fn enter(&mut self, next: LoopPhase) -> bool {
        if self.phase == next {
            return true;
        }
        if !self.phase.can_enter(next) {
            debug!(from = ?self.phase, to = ?next, "Ignoring invalid loop transition");
            return false;
        }
        debug!(from = ?self.phase, to = ?next, iteration = self.iteration, "Loop phase");
        if next == LoopPhase::Cancelled {
            self.cancelled = true;
        }
        self.phase = next;
        true
    }

    /// Another request round is allowed after tool execution.
    pub fn should_continue(&self) -> bool {
        !self.task_completed && !self.awaiting_user && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut state = AgentLoopState::new();
        state.begin_turn();
        assert_eq!(state.phase(), LoopPhase::Requesting);
        assert!(state.enter(LoopPhase::Streaming));
        assert!(state.enter(LoopPhase::ToolExecuting));
        assert!(state.enter(LoopPhase::Requesting));
        assert!(state.enter(LoopPhase::Streaming));
        assert!(state.enter(LoopPhase::Finalizing));
        assert!(state.enter(LoopPhase::Idle));
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut state = AgentLoopState::new();
        assert!(!state.enter(LoopPhase::ToolExecuting));
        assert!(!state.enter(LoopPhase::Cancelled));
        assert_eq!(state.phase(), LoopPhase::Idle);
    }

    #[test]
    fn cancel_from_any_active_phase() {
        let mut state = AgentLoopState::new();
        state.begin_turn();
        state.enter(LoopPhase::Streaming);
        assert!(state.enter(LoopPhase::Cancelled));
        assert!(state.cancelled);
        assert!(!state.should_continue());
        assert!(state.enter(LoopPhase::Finalizing));
    }

    #[test]
    fn begin_turn_resets_flags() {
        let mut state = AgentLoopState::new();
        state.begin_turn();
        state.iteration = 4;
        state.task_completed = true;
        state.enter(LoopPhase::Finalizing);
        state.enter(LoopPhase::Idle);

        state.begin_turn();
        assert_eq!(state.iteration, 0);
        assert!(state.should_continue());
    }
}
