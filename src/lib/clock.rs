// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio::time::Instant;

/// Measures elapsed time of a loop cycle or of a driver call.
///
/// Built on tokio's clock so that tests running with paused time observe
/// the same durations the loop does.
#[derive(Debug, Clone, Copy)]
pub struct CycleTimer {
    start: Instant,
    lap: Instant,
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl CycleTimer {
    pub fn start() -> Self {
        let now = now();
        Self {
            start: now,
            lap: now,
        }
    }

    /// Milliseconds since the timer started
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Milliseconds since the previous lap (or start), then restart the lap.
    pub fn lap_ms(&mut self) -> f64 {
        let now = now();
        let ret = now.duration_since(self.lap).as_micros() as f64 / 1000.0;
        self.lap = now;
        ret
    }
}

pub fn now() -> Instant {
    Instant::now()
}

pub async fn sleep_secs(seconds: u64) {
    tokio::time::sleep(Duration::from_secs(seconds)).await
}
