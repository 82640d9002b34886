use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{sync::mpsc, time};

use ride_tracker_lib::geo::GeoPoint;

use crate::position_stream::{
    PositionError, PositionFix, PositionSource, PositionSubscription, SampleGate, WatchConfig,
};

/// Deterministic in-process position source for tests, demos and the
/// `simulate` command. Fixes come from a scripted route at a fixed device
/// cadence. The route cursor is shared between subscriptions, so a
/// re-subscribe after pause continues where the previous one left off.
#[derive(Debug, Clone)]
pub struct SimulatedPositionSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    granted: AtomicBool,
    cadence: Duration,
    route: Mutex<RouteState>,
}

#[derive(Debug)]
struct RouteState {
    pending: VecDeque<GeoPoint>,
    current: GeoPoint,
}

impl SimulatedPositionSource {
    pub fn new(start: GeoPoint) -> Self {
        Self::with_route(start, Vec::new(), Duration::from_millis(100))
    }

    pub fn with_route(start: GeoPoint, route: Vec<GeoPoint>, cadence: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                granted: AtomicBool::new(true),
                cadence,
                route: Mutex::new(RouteState {
                    pending: route.into(),
                    current: start,
                }),
            }),
        }
    }

    /// Appends a fix to the scripted route.
    pub fn push_position(&self, point: GeoPoint) {
        self.inner.route.lock().unwrap().pending.push_back(point);
    }

    pub fn set_permission(&self, granted: bool) {
        self.inner.granted.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn current_position(&self) -> Result<PositionFix, PositionError> {
        if !self.inner.granted.load(Ordering::SeqCst) {
            return Err(PositionError::PermissionDenied);
        }
        let current = self.inner.route.lock().unwrap().current;
        Ok(PositionFix {
            point: current,
            timestamp: Utc::now(),
        })
    }

    async fn watch(&self, config: WatchConfig) -> Result<PositionSubscription, PositionError> {
        if !self.inner.granted.load(Ordering::SeqCst) {
            return Err(PositionError::PermissionDenied);
        }

        let (tx, rx) = mpsc::channel(16);
        let inner = self.inner.clone();
        let feeder = tokio::spawn(async move {
            let mut gate = SampleGate::new(&config);
            loop {
                time::sleep(inner.cadence).await;
                let next = {
                    let mut route = inner.route.lock().unwrap();
                    match route.pending.pop_front() {
                        Some(point) => {
                            route.current = point;
                            Some(point)
                        }
                        None => None,
                    }
                };
                let Some(point) = next else { continue };
                if !gate.admit(time::Instant::now(), point) {
                    continue;
                }
                let fix = PositionFix {
                    point,
                    timestamp: Utc::now(),
                };
                if tx.send(fix).await.is_err() {
                    break;
                }
            }
        });

        Ok(PositionSubscription::new(rx, feeder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn one_shot_read_fails_without_permission() {
        let source = SimulatedPositionSource::new(GeoPoint::new(47.3769, 8.5417));
        source.set_permission(false);
        assert_eq!(
            source.current_position().await,
            Err(PositionError::PermissionDenied)
        );

        source.set_permission(true);
        let fix = source.current_position().await.unwrap();
        assert_eq!(fix.point, GeoPoint::new(47.3769, 8.5417));
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_route_in_order_and_stops_after_close() {
        let route = vec![
            GeoPoint::new(47.3770, 8.5417),
            GeoPoint::new(47.3771, 8.5417),
            GeoPoint::new(47.3772, 8.5417),
        ];
        let source = SimulatedPositionSource::with_route(
            GeoPoint::new(47.3769, 8.5417),
            route.clone(),
            Duration::from_millis(100),
        );

        let config = WatchConfig {
            min_interval: Duration::ZERO,
            min_distance_m: 0.0,
            ..WatchConfig::default()
        };
        let mut subscription = source.watch(config).await.unwrap();
        for expected in &route {
            assert_eq!(subscription.recv().await.unwrap().point, *expected);
        }
        subscription.close();

        // A point pushed after close stays queued for the next subscription.
        source.push_position(GeoPoint::new(47.3773, 8.5417));
        let mut resumed = source.watch(config).await.unwrap();
        assert_eq!(
            resumed.recv().await.unwrap().point,
            GeoPoint::new(47.3773, 8.5417)
        );
        resumed.close();
    }
}
