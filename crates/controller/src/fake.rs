//! In-memory controller for tests and demos.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::domain::{CueNode, CueSample, Workspace, GROUP_CUE_TYPE};

use crate::{ChannelError, NativeChannel, NativeCommand, NativeReply, TransportAction, WorkspaceScope};

pub fn cue(id: &str, number: &str, name: &str) -> CueNode {
    CueNode {
        id: id.to_string(),
        number: number.to_string(),
        name: name.to_string(),
        cue_type: "Audio".to_string(),
        children: Vec::new(),
    }
}

pub fn group(id: &str, number: &str, name: &str, children: Vec<CueNode>) -> CueNode {
    CueNode {
        id: id.to_string(),
        number: number.to_string(),
        name: name.to_string(),
        cue_type: GROUP_CUE_TYPE.to_string(),
        children,
    }
}

#[derive(Debug, Default)]
struct FakeState {
    running: bool,
    workspaces: Vec<Workspace>,
    front: Option<Workspace>,
    tree: Vec<CueNode>,
    selected: Option<String>,
    active: Option<String>,
    failures: HashMap<&'static str, ChannelError>,
    calls: Vec<&'static str>,
}

/// A scripted controller. Records every command it receives and the highest
/// number of commands it ever saw in flight at once.
#[derive(Debug)]
pub struct FakeController {
    state: Mutex<FakeState>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeController {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                running: true,
                workspaces: vec![Workspace {
                    id: "ws-1".into(),
                    name: "Main Show".into(),
                }],
                ..FakeState::default()
            }),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_tree(self, tree: Vec<CueNode>) -> Self {
        self.lock().tree = tree;
        self
    }

    pub fn with_workspaces(self, workspaces: Vec<Workspace>) -> Self {
        self.lock().workspaces = workspaces;
        self
    }

    pub fn with_front_workspace(self, workspace: Option<Workspace>) -> Self {
        self.lock().front = workspace;
        self
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn select(&self, cue_id: Option<&str>) {
        self.lock().selected = cue_id.map(str::to_string);
    }

    pub fn set_active(&self, cue_id: Option<&str>) {
        self.lock().active = cue_id.map(str::to_string);
    }

    pub fn selected(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    pub fn active(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Makes every command of `kind` fail until cleared.
    pub fn fail_on(&self, kind: &'static str, error: ChannelError) {
        self.lock().failures.insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, kind: &str) -> usize {
        self.lock().calls.iter().filter(|call| **call == kind).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, command: &NativeCommand) -> Result<NativeReply, ChannelError> {
        let mut state = self.lock();
        state.calls.push(command.kind());
        if let Some(error) = state.failures.get(command.kind()) {
            return Err(error.clone());
        }
        if !state.running && *command != NativeCommand::IsRunning {
            return Err(ChannelError::Transport("controller not running".into()));
        }
        if let Some(WorkspaceScope::Id(id)) = scope_of(command) {
            if !state.workspaces.iter().any(|workspace| &workspace.id == id) {
                return Err(ChannelError::Script(format!("Can't get workspace id \"{id}\"")));
            }
        }

        let order: Vec<String> = preorder(&state.tree).iter().map(|node| node.id.clone()).collect();
        let step = |from: &Option<String>, delta: isize| -> Option<String> {
            let index = match from {
                Some(id) => order.iter().position(|candidate| candidate == id)? as isize + delta,
                None => 0,
            };
            usize::try_from(index)
                .ok()
                .and_then(|index| order.get(index).cloned())
                .or_else(|| from.clone())
        };

        match command {
            NativeCommand::IsRunning => Ok(NativeReply::Flag(state.running)),
            NativeCommand::ListWorkspaces => Ok(NativeReply::Workspaces(state.workspaces.clone())),
            NativeCommand::FrontWorkspace => Ok(NativeReply::Workspace(
                state
                    .front
                    .clone()
                    .or_else(|| state.workspaces.first().cloned()),
            )),
            NativeCommand::SelectedCue { .. } => Ok(NativeReply::Cue(sample(&state.tree, &state.selected))),
            NativeCommand::ActiveCue { .. } => Ok(NativeReply::Cue(sample(&state.tree, &state.active))),
            NativeCommand::CueTree { .. } => Ok(NativeReply::Tree(state.tree.clone())),
            NativeCommand::Transport { action, .. } => {
                match action {
                    TransportAction::Go => {
                        state.active = state.selected.clone();
                        state.selected = step(&state.selected, 1);
                    }
                    TransportAction::Stop | TransportAction::Panic => state.active = None,
                    TransportAction::Reset => {
                        state.active = None;
                        state.selected = order.first().cloned();
                    }
                    TransportAction::MovePlayheadDown => state.selected = step(&state.selected, 1),
                    TransportAction::MovePlayheadUp => state.selected = step(&state.selected, -1),
                }
                Ok(NativeReply::Done)
            }
            NativeCommand::SelectCue { cue_id, .. } => {
                if order.iter().any(|id| id == cue_id) {
                    state.selected = Some(cue_id.clone());
                    Ok(NativeReply::Done)
                } else {
                    Err(ChannelError::Script("Cue not found".into()))
                }
            }
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NativeChannel for FakeController {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn execute(&self, command: &NativeCommand) -> Result<NativeReply, ChannelError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.apply(command)
    }
}

fn scope_of(command: &NativeCommand) -> Option<&WorkspaceScope> {
    match command {
        NativeCommand::SelectedCue { scope }
        | NativeCommand::ActiveCue { scope }
        | NativeCommand::CueTree { scope }
        | NativeCommand::Transport { scope, .. }
        | NativeCommand::SelectCue { scope, .. } => Some(scope),
        _ => None,
    }
}

fn preorder(tree: &[CueNode]) -> Vec<&CueNode> {
    let mut out = Vec::new();
    for node in tree {
        out.push(node);
        out.extend(preorder(&node.children));
    }
    out
}

fn sample(tree: &[CueNode], id: &Option<String>) -> Option<CueSample> {
    let id = id.as_ref()?;
    preorder(tree)
        .into_iter()
        .find(|node| &node.id == id)
        .map(|node| CueSample {
            id: Some(node.id.clone()),
            number: node.number.clone(),
            name: node.name.clone(),
            cue_type: node.cue_type.clone(),
        })
}
