use controller::{ChannelError, NativeCommand, WorkspaceScope};
use shared::{
    domain::{Cue, CueRef, CueSample, SelectionState},
    protocol::ServerEvent,
};
use tracing::{debug, error};

use crate::{flatten, Bridge, CommandSerializer};

/// Samples the controller's current and next cue.
///
/// Never fails: a sampling fault collapses both cues to the error shape so
/// the poller keeps running.
pub async fn refresh(
    serializer: &CommandSerializer,
    scope: &WorkspaceScope,
    max_depth: usize,
) -> SelectionState {
    match sample(serializer, scope, max_depth).await {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "cue refresh failed");
            SelectionState::failed(&err.to_string())
        }
    }
}

async fn sample(
    serializer: &CommandSerializer,
    scope: &WorkspaceScope,
    max_depth: usize,
) -> Result<SelectionState, ChannelError> {
    let selected = query_cue(
        serializer,
        NativeCommand::SelectedCue {
            scope: scope.clone(),
        },
    )
    .await?;

    if let Some(current) = selected.filter(|cue| cue.id.is_some()) {
        let cues = flatten(serializer, scope, max_depth).await;
        let next = current
            .id
            .as_deref()
            .and_then(|id| successor(&cues, id))
            .map(CueRef::from_cue);
        return Ok(SelectionState::from_selected(
            CueRef::from_sample(&current),
            next,
        ));
    }

    // An active cue has no reliable successor, so next stays empty.
    let active = query_cue(
        serializer,
        NativeCommand::ActiveCue {
            scope: scope.clone(),
        },
    )
    .await?;
    Ok(match active {
        Some(cue) => SelectionState::from_active(CueRef::from_sample(&cue)),
        None => SelectionState::nothing(),
    })
}

/// A script error means "no usable answer"; anything else is a fault.
async fn query_cue(
    serializer: &CommandSerializer,
    command: NativeCommand,
) -> Result<Option<CueSample>, ChannelError> {
    match serializer
        .execute(&command)
        .await
        .and_then(|reply| reply.into_cue(&command))
    {
        Ok(cue) => Ok(cue),
        Err(err) if err.is_script_error() => {
            debug!(command = command.kind(), error = %err, "controller returned no cue");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn successor<'a>(cues: &'a [Cue], id: &str) -> Option<&'a Cue> {
    let index = cues.iter().position(|cue| cue.id == id)?;
    cues.get(index + 1)
}

impl Bridge {
    /// Last cached current/next cue. Never touches the controller.
    pub fn cue_info(&self) -> SelectionState {
        self.inner.selection.borrow().clone()
    }

    pub fn watch_cue_info(&self) -> tokio::sync::watch::Receiver<SelectionState> {
        self.inner.selection.subscribe()
    }

    /// Samples the connected workspace and stores the result.
    ///
    /// Returns `None` when nothing is connected.
    pub async fn refresh_now(&self) -> Option<SelectionState> {
        let (epoch, scope) = self.connected_scope()?;
        let state = refresh(self.serializer(), &scope, self.config().max_group_depth).await;
        self.store_selection(epoch, &state);
        Some(state)
    }

    /// Writes a sample into the cache unless the connection changed while it
    /// was being taken.
    pub(crate) fn store_selection(&self, epoch: u64, state: &SelectionState) -> bool {
        let registry = self.read_registry();
        if registry.epoch != epoch || registry.connection.is_none() {
            debug!(epoch, current = registry.epoch, "discarding stale cue sample");
            return false;
        }
        let changed = self.inner.selection.send_if_modified(|cached| {
            let changed = !cached.same_cues(state);
            *cached = state.clone();
            changed
        });
        drop(registry);
        if changed {
            self.publish(ServerEvent::CueInfoUpdated {
                current: state.current.clone(),
                next: state.next.clone(),
            });
        }
        true
    }

    pub(crate) fn reset_selection(&self) {
        self.inner.selection.send_replace(SelectionState::empty());
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
