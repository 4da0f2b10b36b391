use chrono::{DateTime, Utc};
use controller::{NativeCommand, WorkspaceScope, FRONT_WORKSPACE_ID};
use shared::{
    domain::{SelectionState, Workspace},
    protocol::{ConnectionInfo, ServerEvent},
};
use tracing::{info, warn};

use crate::{refresh, Bridge, BridgeError, CommandSerializer};

const DEFAULT_WORKSPACE_NAME: &str = "Default Workspace";
const NOT_RUNNING: &str = "controller not running";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub workspace: Workspace,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) discovered: Vec<Workspace>,
    pub(crate) connection: Option<ConnectionState>,
    pub(crate) last_error: Option<String>,
    /// Bumped on every connect and disconnect; cue samples taken under an
    /// older epoch are thrown away.
    pub(crate) epoch: u64,
}

async fn ensure_running(serializer: &CommandSerializer) -> Result<(), BridgeError> {
    let command = NativeCommand::IsRunning;
    match serializer
        .execute(&command)
        .await
        .and_then(|reply| reply.into_flag(&command))
    {
        Ok(true) => Ok(()),
        Ok(false) => Err(BridgeError::ControllerUnreachable(NOT_RUNNING.to_string())),
        Err(err) => {
            warn!(error = %err, "could not reach controller");
            Err(BridgeError::ControllerUnreachable(format!(
                "{NOT_RUNNING}: {err}"
            )))
        }
    }
}

async fn discover_workspaces(serializer: &CommandSerializer) -> Result<Vec<Workspace>, BridgeError> {
    ensure_running(serializer).await?;

    let command = NativeCommand::ListWorkspaces;
    let workspaces = serializer
        .execute(&command)
        .await
        .and_then(|reply| reply.into_workspaces(&command))
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to list workspaces");
            Vec::new()
        });
    if !workspaces.is_empty() {
        info!(count = workspaces.len(), "found workspaces");
        return Ok(workspaces);
    }

    // A running controller always gets something to connect to.
    let command = NativeCommand::FrontWorkspace;
    let front = serializer
        .execute(&command)
        .await
        .and_then(|reply| reply.into_workspace(&command))
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to read front workspace");
            None
        });
    // The id must survive a URL path segment, so an unnamed front workspace
    // is addressed through the front-workspace alias.
    let (id, name) = match front {
        Some(workspace) => (workspace.id, workspace.name),
        None => (String::new(), String::new()),
    };
    let fallback = Workspace {
        id: if id.trim().is_empty() {
            FRONT_WORKSPACE_ID.to_string()
        } else {
            id
        },
        name: if name.is_empty() {
            DEFAULT_WORKSPACE_NAME.to_string()
        } else {
            name
        },
    };
    info!(workspace_id = %fallback.id, "controller reported no workspaces, using front workspace");
    Ok(vec![fallback])
}

impl Bridge {
    /// Re-discovers workspaces, replacing the previously discovered set.
    pub async fn discover(&self) -> Result<Vec<Workspace>, BridgeError> {
        let found = discover_workspaces(self.serializer()).await;
        let mut registry = self.write_registry();
        match found {
            Ok(workspaces) => {
                registry.discovered = workspaces.clone();
                Ok(workspaces)
            }
            Err(err) => {
                registry.discovered.clear();
                registry.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn discovered(&self) -> Vec<Workspace> {
        self.read_registry().discovered.clone()
    }

    /// Switches to `workspace_id`, dropping the previous connection's cache,
    /// and returns the first cue sample of the new connection.
    pub async fn connect(&self, workspace_id: &str) -> Result<SelectionState, BridgeError> {
        let workspace = match self.find_discovered(workspace_id) {
            Some(workspace) => workspace,
            None => {
                self.discover().await?;
                self.find_discovered(workspace_id)
                    .ok_or_else(|| BridgeError::UnknownWorkspace(workspace_id.to_string()))?
            }
        };

        if let Err(err) = ensure_running(self.serializer()).await {
            self.write_registry().last_error = Some(err.to_string());
            return Err(err);
        }

        let epoch = {
            let mut registry = self.write_registry();
            registry.epoch += 1;
            registry.connection = Some(ConnectionState {
                workspace: workspace.clone(),
                connected_at: Utc::now(),
            });
            registry.last_error = None;
            self.reset_selection();
            registry.epoch
        };
        info!(workspace_id = %workspace.id, name = %workspace.name, "connected to workspace");
        self.publish(ServerEvent::Connected {
            workspace: workspace.clone(),
        });

        let state = refresh(
            self.serializer(),
            &WorkspaceScope::for_id(&workspace.id),
            self.config().max_group_depth,
        )
        .await;
        self.store_selection(epoch, &state);
        Ok(state)
    }

    pub fn disconnect(&self) {
        let previous = {
            let mut registry = self.write_registry();
            registry.epoch += 1;
            self.reset_selection();
            registry.connection.take()
        };
        if let Some(connection) = previous {
            info!(workspace_id = %connection.workspace.id, "disconnected from workspace");
            self.publish(ServerEvent::Disconnected);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.read_registry().connection.is_some()
    }

    pub fn connection(&self) -> ConnectionInfo {
        let registry = self.read_registry();
        ConnectionInfo {
            connected: registry.connection.is_some(),
            workspace: registry
                .connection
                .as_ref()
                .map(|connection| connection.workspace.clone()),
            last_error: registry.last_error.clone(),
            connected_at: registry
                .connection
                .as_ref()
                .map(|connection| connection.connected_at),
        }
    }

    pub(crate) fn connected_scope(&self) -> Option<(u64, WorkspaceScope)> {
        let registry = self.read_registry();
        registry
            .connection
            .as_ref()
            .map(|connection| (registry.epoch, WorkspaceScope::for_id(&connection.workspace.id)))
    }

    fn find_discovered(&self, workspace_id: &str) -> Option<Workspace> {
        self.read_registry()
            .discovered
            .iter()
            .find(|workspace| workspace.id == workspace_id)
            .cloned()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
