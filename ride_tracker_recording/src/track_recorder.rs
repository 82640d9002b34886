use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use ride_tracker_lib::track_session::{
    InvalidTransition, RecordingState, SessionCommand, SessionSnapshot, TrackSession,
};

use crate::{
    position_stream::{PositionError, PositionFix, PositionSource, PositionSubscription, WatchConfig},
    sample_clock::{SampleClock, TICK_PERIOD},
};

#[derive(Debug)]
pub enum RecordingError {
    /// Location access is not granted; recording cannot start.
    PermissionDenied,
    /// A command was issued in a state that does not permit it. No state
    /// was changed.
    InvalidTransition(InvalidTransition),
    /// The position source failed for a reason other than permissions.
    Position(PositionError),
    /// The recorder task is gone.
    Closed,
}

impl From<InvalidTransition> for RecordingError {
    fn from(err: InvalidTransition) -> Self {
        RecordingError::InvalidTransition(err)
    }
}

impl From<PositionError> for RecordingError {
    fn from(err: PositionError) -> Self {
        match err {
            PositionError::PermissionDenied => RecordingError::PermissionDenied,
            other => RecordingError::Position(other),
        }
    }
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::PermissionDenied => write!(f, "location permission not granted"),
            RecordingError::InvalidTransition(err) => write!(f, "{err}"),
            RecordingError::Position(err) => write!(f, "{err}"),
            RecordingError::Closed => write!(f, "recorder is no longer running"),
        }
    }
}

impl std::error::Error for RecordingError {}

#[derive(Debug, Clone, Copy)]
pub struct RecorderConfig {
    pub watch: WatchConfig,
    pub tick_period: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            tick_period: TICK_PERIOD,
        }
    }
}

enum Command {
    Start(oneshot::Sender<Result<(), RecordingError>>),
    Pause(oneshot::Sender<Result<(), RecordingError>>),
    Resume(oneshot::Sender<Result<(), RecordingError>>),
    Stop(oneshot::Sender<Result<TrackSession, RecordingError>>),
}

/// Handle to the recorder actor. One task owns the session, the clock and
/// the position subscription; every mutation (command, tick or sample) is
/// serialized through it. Commands are acknowledged only after all their
/// effects, including detaching the clock and subscription, are applied.
pub struct TrackRecorder {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    actor: JoinHandle<()>,
}

impl TrackRecorder {
    pub fn spawn(source: Arc<dyn PositionSource>) -> Self {
        Self::spawn_with_config(source, RecorderConfig::default())
    }

    pub fn spawn_with_config(source: Arc<dyn PositionSource>, config: RecorderConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (snapshot_tx, snapshot_rx) = watch::channel(TrackSession::new().snapshot());
        let actor = tokio::spawn(recorder_task(source, config, command_rx, snapshot_tx));
        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            actor,
        }
    }

    /// Seeds a fresh session with a one-shot position read, then opens the
    /// subscription and the clock. On failure the session stays `Idle`.
    pub async fn start(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Start(tx))
            .await
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)?
    }

    /// Freezes the session. The subscription and clock are fully detached
    /// before this returns.
    pub async fn pause(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Pause(tx))
            .await
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)?
    }

    /// Re-subscribes with the same configuration and a fresh clock. The
    /// last recorded point stays the reference for the next distance delta.
    pub async fn resume(&self) -> Result<(), RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Resume(tx))
            .await
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)?
    }

    /// Detaches everything and returns the final, immutable session, ready
    /// for finalization. The recorder itself resets to a fresh `Idle`
    /// session for the next recording.
    pub async fn stop(&self) -> Result<TrackSession, RecordingError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stop(tx))
            .await
            .map_err(|_| RecordingError::Closed)?;
        rx.await.map_err(|_| RecordingError::Closed)?
    }

    /// Most recently published live snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Live snapshot channel for display updates.
    pub fn watch_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}

impl Drop for TrackRecorder {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

async fn recorder_task(
    source: Arc<dyn PositionSource>,
    config: RecorderConfig,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    let mut session = TrackSession::new();
    let mut subscription: Option<PositionSubscription> = None;
    let mut clock: Option<SampleClock> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Start(reply) => {
                        let result = handle_start(&source, &config, &mut session, &mut subscription, &mut clock).await;
                        warn_if_invalid(&result);
                        publish(&snapshots, &session);
                        let _ = reply.send(result);
                    }
                    Command::Pause(reply) => {
                        let result = handle_pause(&mut session, &mut subscription, &mut clock);
                        warn_if_invalid(&result);
                        publish(&snapshots, &session);
                        let _ = reply.send(result);
                    }
                    Command::Resume(reply) => {
                        let result = handle_resume(&source, &config, &mut session, &mut subscription, &mut clock).await;
                        warn_if_invalid(&result);
                        publish(&snapshots, &session);
                        let _ = reply.send(result);
                    }
                    Command::Stop(reply) => {
                        let result = handle_stop(&mut session, &mut subscription, &mut clock);
                        warn_if_invalid(&result);
                        publish(&snapshots, &session);
                        let _ = reply.send(result);
                    }
                }
            }
            sample = next_sample(&mut subscription) => {
                match sample {
                    Some(fix) => {
                        if session.apply_sample(fix.point) {
                            publish(&snapshots, &session);
                        } else {
                            tracing::warn!("discarding position sample delivered in state {:?}", session.state());
                        }
                    }
                    None => subscription = None,
                }
            }
            tick = next_tick(&mut clock) => {
                match tick {
                    Some(()) => {
                        if session.apply_tick() {
                            publish(&snapshots, &session);
                        } else {
                            tracing::warn!("discarding clock tick delivered in state {:?}", session.state());
                        }
                    }
                    None => clock = None,
                }
            }
        }
    }

    detach(&mut subscription, &mut clock);
}

async fn next_sample(subscription: &mut Option<PositionSubscription>) -> Option<PositionFix> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(clock: &mut Option<SampleClock>) -> Option<()> {
    match clock {
        Some(clock) => clock.tick().await,
        None => std::future::pending().await,
    }
}

fn publish(snapshots: &watch::Sender<SessionSnapshot>, session: &TrackSession) {
    let _ = snapshots.send(session.snapshot());
}

fn warn_if_invalid<T>(result: &Result<T, RecordingError>) {
    if let Err(RecordingError::InvalidTransition(err)) = result {
        tracing::warn!("ignoring command: {err}");
    }
}

async fn handle_start(
    source: &Arc<dyn PositionSource>,
    config: &RecorderConfig,
    session: &mut TrackSession,
    subscription: &mut Option<PositionSubscription>,
    clock: &mut Option<SampleClock>,
) -> Result<(), RecordingError> {
    if session.state() != RecordingState::Idle {
        return Err(InvalidTransition {
            from: session.state(),
            command: SessionCommand::Start,
        }
        .into());
    }

    let first = source.current_position().await?;
    let opened = source.watch(config.watch).await?;

    session.start(first.point, first.timestamp)?;
    *subscription = Some(opened);
    *clock = Some(SampleClock::start(config.tick_period));

    tracing::info!("recording started at {:?}", first.point);
    Ok(())
}

fn handle_pause(
    session: &mut TrackSession,
    subscription: &mut Option<PositionSubscription>,
    clock: &mut Option<SampleClock>,
) -> Result<(), RecordingError> {
    session.pause()?;
    detach(subscription, clock);
    tracing::debug!("recording paused");
    Ok(())
}

async fn handle_resume(
    source: &Arc<dyn PositionSource>,
    config: &RecorderConfig,
    session: &mut TrackSession,
    subscription: &mut Option<PositionSubscription>,
    clock: &mut Option<SampleClock>,
) -> Result<(), RecordingError> {
    session.resume()?;
    match source.watch(config.watch).await {
        Ok(opened) => {
            *subscription = Some(opened);
            *clock = Some(SampleClock::start(config.tick_period));
            tracing::debug!("recording resumed");
            Ok(())
        }
        Err(err) => {
            // Fall back to Paused so a later resume can retry.
            let _ = session.pause();
            Err(err.into())
        }
    }
}

fn handle_stop(
    session: &mut TrackSession,
    subscription: &mut Option<PositionSubscription>,
    clock: &mut Option<SampleClock>,
) -> Result<TrackSession, RecordingError> {
    session.stop()?;
    detach(subscription, clock);

    // Hand the finished session out and reset to a fresh Idle one.
    let finished = std::mem::take(session);
    tracing::info!(
        distance_km = finished.distance_km(),
        elapsed_seconds = finished.elapsed_seconds(),
        points = finished.points().len(),
        "recording stopped"
    );
    Ok(finished)
}

fn detach(subscription: &mut Option<PositionSubscription>, clock: &mut Option<SampleClock>) {
    if let Some(subscription) = subscription.take() {
        subscription.close();
    }
    if let Some(clock) = clock.take() {
        clock.stop();
    }
}
