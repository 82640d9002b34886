use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use ride_tracker_lib::geo::{haversine_km, GeoPoint};

/// One sample from a position source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub point: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyTier {
    Low,
    Balanced,
    High,
}

/// Subscription options. A sample is emitted only once both gates are
/// satisfied, whichever is reached last.
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub accuracy: AccuracyTier,
    pub min_interval: Duration,
    pub min_distance_m: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::High,
            min_interval: Duration::from_millis(2000),
            min_distance_m: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// Location access is not granted.
    PermissionDenied,
    /// The device could not produce a position.
    Unavailable(String),
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionError::PermissionDenied => write!(f, "location permission not granted"),
            PositionError::Unavailable(reason) => write!(f, "position unavailable: {reason}"),
        }
    }
}

impl std::error::Error for PositionError {}

/// Emission gate for a continuous subscription. The first fix always
/// passes; afterwards a fix passes only when the time gate AND the
/// displacement gate are both satisfied, measured against the last fix that
/// passed.
#[derive(Debug)]
pub struct SampleGate {
    min_interval: Duration,
    min_distance_km: f64,
    last: Option<(Instant, GeoPoint)>,
}

impl SampleGate {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            min_interval: config.min_interval,
            min_distance_km: config.min_distance_m / 1000.0,
            last: None,
        }
    }

    pub fn admit(&mut self, now: Instant, point: GeoPoint) -> bool {
        let pass = match self.last {
            None => true,
            Some((at, from)) => {
                now.duration_since(at) >= self.min_interval
                    && haversine_km(from, point) >= self.min_distance_km
            }
        };
        if pass {
            self.last = Some((now, point));
        }
        pass
    }
}

/// A device position capability. Implementations deliver fixes in order and
/// stop delivering as soon as the subscription handle is closed.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Immediate one-shot read of the current position. Used to seed a
    /// session's first point and for map centering before recording starts.
    async fn current_position(&self) -> Result<PositionFix, PositionError>;

    /// Opens a continuous subscription honouring the config's emission
    /// gates.
    async fn watch(&self, config: WatchConfig) -> Result<PositionSubscription, PositionError>;
}

/// Handle over an open subscription: a bounded sample channel plus the task
/// feeding it. Closing (or dropping) the handle detaches the feeder; no
/// sample can be observed afterwards. The recorder always closes before
/// re-subscribing.
#[derive(Debug)]
pub struct PositionSubscription {
    samples: mpsc::Receiver<PositionFix>,
    feeder: JoinHandle<()>,
}

impl PositionSubscription {
    pub fn new(samples: mpsc::Receiver<PositionFix>, feeder: JoinHandle<()>) -> Self {
        Self { samples, feeder }
    }

    /// Next sample, in delivery order. `None` once the source is exhausted.
    pub async fn recv(&mut self) -> Option<PositionFix> {
        self.samples.recv().await
    }

    pub fn close(mut self) {
        self.feeder.abort();
        self.samples.close();
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.feeder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_interval_ms: u64, min_distance_m: f64) -> WatchConfig {
        WatchConfig {
            accuracy: AccuracyTier::High,
            min_interval: Duration::from_millis(min_interval_ms),
            min_distance_m,
        }
    }

    #[tokio::test]
    async fn first_fix_always_passes() {
        let mut gate = SampleGate::new(&config(2000, 3.0));
        assert!(gate.admit(Instant::now(), GeoPoint::new(47.3769, 8.5417)));
    }

    #[tokio::test]
    async fn both_gates_must_be_satisfied() {
        let mut gate = SampleGate::new(&config(2000, 3.0));
        let t0 = Instant::now();
        let origin = GeoPoint::new(47.3769, 8.5417);
        // ~100 m and ~1 m north of the origin.
        let far = GeoPoint::new(47.3769 + 0.1 / 111.195, 8.5417);
        let near = GeoPoint::new(47.3769 + 0.001 / 111.195, 8.5417);

        assert!(gate.admit(t0, origin));
        // Displacement reached, time gate not.
        assert!(!gate.admit(t0 + Duration::from_millis(500), far));
        // Time gate reached, displacement not.
        assert!(!gate.admit(t0 + Duration::from_secs(3), near));
        // Both reached.
        assert!(gate.admit(t0 + Duration::from_secs(3), far));
    }

    #[tokio::test]
    async fn rejected_fixes_do_not_move_the_reference() {
        let mut gate = SampleGate::new(&config(1000, 3.0));
        let t0 = Instant::now();
        let origin = GeoPoint::new(47.3769, 8.5417);
        // ~2 m per step: each step is under the gate, but they add up.
        let step = GeoPoint::new(47.3769 + 0.002 / 111.195, 8.5417);
        let two_steps = GeoPoint::new(47.3769 + 0.004 / 111.195, 8.5417);

        assert!(gate.admit(t0, origin));
        assert!(!gate.admit(t0 + Duration::from_secs(2), step));
        // Displacement is measured from the last admitted fix, so the
        // accumulated movement eventually passes.
        assert!(gate.admit(t0 + Duration::from_secs(4), two_steps));
    }
}
