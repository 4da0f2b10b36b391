use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Cue, CueRef, SelectionState, Workspace};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancesResponse {
    pub success: bool,
    pub instances: Vec<Workspace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub success: bool,
    pub workspace: Workspace,
    pub current_cue: CueRef,
    pub next_cue: CueRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub cue: Option<String>,
}

/// Result of one dispatched command. Failures are data, not HTTP errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueInfoResponse {
    pub success: bool,
    pub current: CueRef,
    pub next: CueRef,
}

impl From<SelectionState> for CueInfoResponse {
    fn from(state: SelectionState) -> Self {
        Self {
            success: true,
            current: state.current,
            next: state.next,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuesResponse {
    pub cues: Vec<Cue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub connected: bool,
    pub average_latency_ms: f64,
    pub commands_sent: u64,
    pub error_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Workspace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    CueInfoUpdated {
        current: CueRef,
        next: CueRef,
    },
    Connected {
        workspace: Workspace,
    },
    Disconnected,
    CommandCompleted {
        command: String,
        result: CommandResult,
    },
}
