use std::time::Duration;

use shared::protocol::PerformanceSnapshot;

use crate::Bridge;

/// Command counters for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceCounters {
    pub commands_sent: u64,
    pub error_count: u64,
    pub total_latency_ms: f64,
}

impl PerformanceCounters {
    pub fn record(&mut self, latency: Duration, success: bool) {
        self.commands_sent += 1;
        self.total_latency_ms += latency.as_secs_f64() * 1000.0;
        if !success {
            self.error_count += 1;
        }
    }

    pub fn snapshot(&self, connected: bool) -> PerformanceSnapshot {
        let (average, error_rate) = if self.commands_sent == 0 {
            (0.0, 0.0)
        } else {
            let sent = self.commands_sent as f64;
            (
                self.total_latency_ms / sent,
                self.error_count as f64 / sent * 100.0,
            )
        };
        PerformanceSnapshot {
            connected,
            average_latency_ms: round1(average),
            commands_sent: self.commands_sent,
            error_rate_percent: round1(error_rate),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Bridge {
    pub fn performance(&self) -> PerformanceSnapshot {
        let connected = self.is_connected();
        self.counters().snapshot(connected)
    }

    pub(crate) fn record_command(&self, latency: Duration, success: bool) {
        self.counters().record(latency, success);
    }
}
