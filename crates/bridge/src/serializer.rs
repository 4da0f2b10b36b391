use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use controller::{ChannelError, NativeChannel, NativeCommand, NativeReply};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Gate that lets exactly one native call run at a time, process-wide.
///
/// The lock covers a single call only. Multi-call sequences such as a cue
/// refresh take it once per call, so other callers may interleave between
/// steps.
pub struct CommandSerializer {
    channel: Arc<dyn NativeChannel>,
    gate: Mutex<()>,
    executed: AtomicU64,
}

impl CommandSerializer {
    pub fn new(channel: Arc<dyn NativeChannel>) -> Self {
        Self {
            channel,
            gate: Mutex::new(()),
            executed: AtomicU64::new(0),
        }
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Number of native calls issued so far.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub async fn execute(&self, command: &NativeCommand) -> Result<NativeReply, ChannelError> {
        let _permit = self.gate.lock().await;
        self.executed.fetch_add(1, Ordering::Relaxed);
        trace!(command = command.kind(), "native call");
        let result = self.channel.execute(command).await;
        if let Err(error) = &result {
            debug!(command = command.kind(), %error, "native call failed");
        }
        result
    }
}
