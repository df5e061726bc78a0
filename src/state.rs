//! Coordinator execution/agent state enums (§3, §4.9).
//!
//! Lives outside `coordinator/` so both the coordinator and the UI wire
//! projection can depend on it without a module cycle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    #[default]
    Idle,
    Continue,
    Step,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    AgentRunning,
    LlmThinking,
    ToolExecuting,
    Halted,
    Halting,
    #[default]
    AgentFinished,
}
