//! Cue state synchronization and command bridge.
//!
//! [`Bridge`] is the shared application state: it owns the serialized native
//! channel, the registry of discovered workspaces and the active connection,
//! the cached current/next cue, and the performance counters. Read paths only
//! touch the cache; every native call goes through [`CommandSerializer`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use controller::NativeChannel;
use shared::{domain::SelectionState, protocol::ServerEvent};
use tokio::sync::{broadcast, watch};

mod dispatch;
mod error;
mod flatten;
mod metrics;
mod refresher;
mod registry;
mod selection;
mod serializer;

pub use dispatch::Command;
pub use error::BridgeError;
pub use flatten::{flatten, flatten_tree};
pub use metrics::PerformanceCounters;
pub use refresher::{spawn_refresher, RefresherHandle, DEFAULT_POLL_INTERVAL};
pub use registry::ConnectionState;
pub use selection::refresh;
pub use serializer::CommandSerializer;

use registry::Registry;

pub const DEFAULT_MAX_GROUP_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How many levels of group cues are descended when flattening.
    pub max_group_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }
}

#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

struct Inner {
    serializer: CommandSerializer,
    config: BridgeConfig,
    registry: RwLock<Registry>,
    selection: watch::Sender<SelectionState>,
    counters: Mutex<PerformanceCounters>,
    events: broadcast::Sender<ServerEvent>,
}

impl Bridge {
    pub fn new(channel: Arc<dyn NativeChannel>, config: BridgeConfig) -> Self {
        let (selection, _) = watch::channel(SelectionState::empty());
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                serializer: CommandSerializer::new(channel),
                config,
                registry: RwLock::new(Registry::default()),
                selection,
                counters: Mutex::new(PerformanceCounters::default()),
                events,
            }),
        }
    }

    pub fn serializer(&self) -> &CommandSerializer {
        &self.inner.serializer
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Live feed of cue, connection and command events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: ServerEvent) {
        // No subscribers is the normal case when no websocket is open.
        let _ = self.inner.events.send(event);
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn counters(&self) -> MutexGuard<'_, PerformanceCounters> {
        self.inner
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
