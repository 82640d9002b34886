use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

/// A command was issued in a state that does not permit it. The session is
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: RecordingState,
    pub command: SessionCommand,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} is not valid from {:?}", self.command, self.from)
    }
}

impl std::error::Error for InvalidTransition {}

/// One recording, from start to stop. Owned and mutated exclusively by the
/// track recorder; every other component works on snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSession {
    state: RecordingState,
    points: Vec<GeoPoint>,
    distance_km: f64,
    elapsed_seconds: u64,
    started_at: Option<DateTime<Utc>>,
}

impl TrackSession {
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            points: Vec::new(),
            distance_km: 0.0,
            elapsed_seconds: 0,
            started_at: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Route points in arrival order. The first element is the position
    /// captured at start.
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Haversine sum over consecutive points, accumulated one delta per
    /// accepted sample. Never rebuilt from the full list, so floating-point
    /// drift over a long session is an accepted, bounded approximation.
    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Seconds spent in `Recording`, one per delivered tick. Not a
    /// wall-clock span: paused time is not counted.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn start(
        &mut self,
        first_point: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        if self.state != RecordingState::Idle {
            return Err(InvalidTransition {
                from: self.state,
                command: SessionCommand::Start,
            });
        }
        self.points = vec![first_point];
        self.distance_km = 0.0;
        self.elapsed_seconds = 0;
        self.started_at = Some(at);
        self.state = RecordingState::Recording;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), InvalidTransition> {
        if self.state != RecordingState::Recording {
            return Err(InvalidTransition {
                from: self.state,
                command: SessionCommand::Pause,
            });
        }
        self.state = RecordingState::Paused;
        Ok(())
    }

    /// The last point recorded before the pause stays the reference for the
    /// next sample's distance delta. Movement while paused produces no
    /// samples and is not counted.
    pub fn resume(&mut self) -> Result<(), InvalidTransition> {
        if self.state != RecordingState::Paused {
            return Err(InvalidTransition {
                from: self.state,
                command: SessionCommand::Resume,
            });
        }
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Terminal for this session. The aggregate is immutable afterwards and
    /// ready for finalization.
    pub fn stop(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            RecordingState::Recording | RecordingState::Paused => {
                self.state = RecordingState::Stopped;
                Ok(())
            }
            _ => Err(InvalidTransition {
                from: self.state,
                command: SessionCommand::Stop,
            }),
        }
    }

    /// Returns false when the sample is discarded. A sample delivered
    /// outside `Recording` is a protocol violation and is never applied.
    pub fn apply_sample(&mut self, point: GeoPoint) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        if let Some(last) = self.points.last() {
            self.distance_km += haversine_km(*last, point);
        }
        self.points.push(point);
        true
    }

    /// Counts one second of recording time. Ticks outside `Recording` are
    /// discarded.
    pub fn apply_tick(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            points: self.points.clone(),
            distance_km: self.distance_km,
            elapsed_seconds: self.elapsed_seconds,
            started_at: self.started_at,
        }
    }
}

impl Default for TrackSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a session, taken for live display and at stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: RecordingState,
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
}
