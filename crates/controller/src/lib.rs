//! Access to the playback controller's native command interface.
//!
//! The controller is driven one command at a time through a [`NativeChannel`].
//! Channels are not assumed to be reentrant; callers that share one must
//! serialize access themselves.

use async_trait::async_trait;
use shared::domain::{CueNode, CueSample, Workspace};
use thiserror::Error;

mod applescript;
#[cfg(feature = "fake")]
pub mod fake;

pub use applescript::{applescript_escape, AppleScriptChannel, DEFAULT_BUNDLE_ID};

/// Id handed out for a workspace the controller could not name; addresses
/// the front workspace.
pub const FRONT_WORKSPACE_ID: &str = "front";

/// Which workspace a command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceScope {
    Front,
    Id(String),
}

impl WorkspaceScope {
    /// An empty id or [`FRONT_WORKSPACE_ID`] addresses the front workspace.
    pub fn for_id(workspace_id: &str) -> Self {
        let trimmed = workspace_id.trim();
        if trimmed.is_empty() || trimmed == FRONT_WORKSPACE_ID {
            Self::Front
        } else {
            Self::Id(workspace_id.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    Go,
    Stop,
    Panic,
    Reset,
    MovePlayheadDown,
    MovePlayheadUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCommand {
    IsRunning,
    ListWorkspaces,
    FrontWorkspace,
    SelectedCue {
        scope: WorkspaceScope,
    },
    ActiveCue {
        scope: WorkspaceScope,
    },
    CueTree {
        scope: WorkspaceScope,
    },
    Transport {
        scope: WorkspaceScope,
        action: TransportAction,
    },
    SelectCue {
        scope: WorkspaceScope,
        cue_id: String,
    },
}

impl NativeCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IsRunning => "is_running",
            Self::ListWorkspaces => "list_workspaces",
            Self::FrontWorkspace => "front_workspace",
            Self::SelectedCue { .. } => "selected_cue",
            Self::ActiveCue { .. } => "active_cue",
            Self::CueTree { .. } => "cue_tree",
            Self::Transport { .. } => "transport",
            Self::SelectCue { .. } => "select_cue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeReply {
    Done,
    Flag(bool),
    Workspaces(Vec<Workspace>),
    Workspace(Option<Workspace>),
    Cue(Option<CueSample>),
    Tree(Vec<CueNode>),
}

impl NativeReply {
    fn kind(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Flag(_) => "flag",
            Self::Workspaces(_) => "workspaces",
            Self::Workspace(_) => "workspace",
            Self::Cue(_) => "cue",
            Self::Tree(_) => "tree",
        }
    }

    pub fn into_flag(self, command: &NativeCommand) -> Result<bool, ChannelError> {
        match self {
            Self::Flag(value) => Ok(value),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }

    pub fn into_workspaces(self, command: &NativeCommand) -> Result<Vec<Workspace>, ChannelError> {
        match self {
            Self::Workspaces(list) => Ok(list),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }

    pub fn into_workspace(
        self,
        command: &NativeCommand,
    ) -> Result<Option<Workspace>, ChannelError> {
        match self {
            Self::Workspace(workspace) => Ok(workspace),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }

    pub fn into_cue(self, command: &NativeCommand) -> Result<Option<CueSample>, ChannelError> {
        match self {
            Self::Cue(sample) => Ok(sample),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }

    pub fn into_tree(self, command: &NativeCommand) -> Result<Vec<CueNode>, ChannelError> {
        match self {
            Self::Tree(tree) => Ok(tree),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }

    pub fn into_done(self, command: &NativeCommand) -> Result<(), ChannelError> {
        match self {
            Self::Done => Ok(()),
            other => Err(ChannelError::unexpected(command, &other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The controller ran the command and reported an error.
    #[error("script error: {0}")]
    Script(String),
    /// The command could not be delivered to the controller.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed reply: {0}")]
    Protocol(String),
    #[error("unexpected {reply} reply to {command}")]
    UnexpectedReply {
        command: &'static str,
        reply: &'static str,
    },
}

impl ChannelError {
    fn unexpected(command: &NativeCommand, reply: &NativeReply) -> Self {
        Self::UnexpectedReply {
            command: command.kind(),
            reply: reply.kind(),
        }
    }

    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Script(_))
    }
}

#[async_trait]
pub trait NativeChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, command: &NativeCommand) -> Result<NativeReply, ChannelError>;
}
