use std::{str::FromStr, time::Instant};

use controller::{NativeCommand, TransportAction, WorkspaceScope};
use shared::protocol::{CommandResult, ServerEvent};
use tracing::{info, warn};

use crate::{Bridge, BridgeError};

/// The closed set of commands a client may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Stop,
    Next,
    Previous,
    Panic,
    Reset,
    Skip,
}

impl FromStr for Command {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" | "go" => Ok(Self::Play),
            "stop" => Ok(Self::Stop),
            "next" => Ok(Self::Next),
            "previous" => Ok(Self::Previous),
            "panic" => Ok(Self::Panic),
            "reset" => Ok(Self::Reset),
            "skip" => Ok(Self::Skip),
            _ => Err(BridgeError::UnknownCommand(s.to_string())),
        }
    }
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Panic => "panic",
            Self::Reset => "reset",
            Self::Skip => "skip",
        }
    }

    /// Panic is left alone so the cache does not race an emergency stop.
    pub fn refreshes_after(self) -> bool {
        !matches!(self, Self::Panic)
    }

    pub fn to_native(
        self,
        scope: WorkspaceScope,
        cue_id: Option<&str>,
    ) -> Result<NativeCommand, BridgeError> {
        let action = match self {
            Self::Play => TransportAction::Go,
            Self::Stop => TransportAction::Stop,
            Self::Next => TransportAction::MovePlayheadDown,
            Self::Previous => TransportAction::MovePlayheadUp,
            Self::Panic => TransportAction::Panic,
            Self::Reset => TransportAction::Reset,
            Self::Skip => {
                let cue_id = cue_id
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or(BridgeError::MissingCueId)?;
                return Ok(NativeCommand::SelectCue {
                    scope,
                    cue_id: cue_id.to_string(),
                });
            }
        };
        Ok(NativeCommand::Transport { scope, action })
    }
}

impl Bridge {
    /// Runs one client command against the connected workspace.
    ///
    /// Only a missing connection is an `Err`; every other failure is reported
    /// in the returned [`CommandResult`] and counted.
    pub async fn dispatch(
        &self,
        name: &str,
        cue_id: Option<&str>,
    ) -> Result<CommandResult, BridgeError> {
        let (_, scope) = self.connected_scope().ok_or(BridgeError::NotConnected)?;
        let started = Instant::now();

        let mut refresh_after = false;
        let outcome = match name
            .parse::<Command>()
            .and_then(|command| Ok((command, command.to_native(scope, cue_id)?)))
        {
            Ok((command, native)) => {
                refresh_after = command.refreshes_after();
                self.serializer()
                    .execute(&native)
                    .await
                    .and_then(|reply| reply.into_done(&native))
                    .map_err(BridgeError::from)
            }
            Err(err) => Err(err),
        };

        let latency = started.elapsed();
        self.record_command(latency, outcome.is_ok());
        let result = CommandResult {
            success: outcome.is_ok(),
            latency_ms: latency.as_secs_f64() * 1000.0,
            error: outcome.as_ref().err().map(ToString::to_string),
        };
        match &outcome {
            Ok(()) => info!(command = name, latency_ms = result.latency_ms, "command sent"),
            Err(err) => warn!(command = name, error = %err, "command failed"),
        }

        if refresh_after {
            let bridge = self.clone();
            tokio::spawn(async move {
                bridge.refresh_now().await;
            });
        }

        self.publish(ServerEvent::CommandCompleted {
            command: name.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Selects a cue by unique id without playing it.
    pub async fn skip_to(&self, cue_id: &str) -> Result<CommandResult, BridgeError> {
        self.dispatch(Command::Skip.as_str(), Some(cue_id)).await
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
