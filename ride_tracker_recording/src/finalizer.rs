use chrono::Utc;
use uuid::Uuid;

use ride_tracker_lib::{
    track_session::{RecordingState, TrackSession},
    trip::{format_duration, ImageRef, Trip},
};

use crate::store::{StorageError, TripStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeError {
    /// The trip name is empty or whitespace-only; nothing is persisted.
    EmptyName,
    /// Only a stopped session can be finalized.
    SessionActive(RecordingState),
}

impl std::fmt::Display for FinalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalizeError::EmptyName => write!(f, "trip name must not be empty"),
            FinalizeError::SessionActive(state) => {
                write!(f, "session must be stopped to finalize, is {state:?}")
            }
        }
    }
}

impl std::error::Error for FinalizeError {}

/// Builds the persistable trip from a stopped session. The session itself
/// is left untouched; a rejected name keeps it ready for another attempt.
pub fn finalize(
    session: &TrackSession,
    name: &str,
    image: Option<ImageRef>,
) -> Result<Trip, FinalizeError> {
    if session.state() != RecordingState::Stopped {
        return Err(FinalizeError::SessionActive(session.state()));
    }
    if name.trim().is_empty() {
        return Err(FinalizeError::EmptyName);
    }

    Ok(Trip {
        id: Uuid::new_v4(),
        name: name.to_string(),
        distance_km: session.distance_km(),
        duration: format_duration(session.elapsed_seconds()),
        points: session.points().to_vec(),
        image,
        created_at: Utc::now(),
    })
}

/// Writes the trip row, then its points in sample order. A failed point
/// insert deletes the trip row again, so no orphaned trip survives a
/// partial save. No retries.
pub async fn save_trip(store: &dyn TripStore, trip: &Trip) -> Result<(), StorageError> {
    store.insert_trip(trip).await?;

    if let Err(err) = store.insert_route_points(trip.id, &trip.points).await {
        tracing::error!("route point insert failed for trip {}: {err}", trip.id);
        if let Err(cleanup) = store.delete_trip(trip.id).await {
            tracing::error!("failed to delete orphaned trip {}: {cleanup}", trip.id);
        }
        return Err(err);
    }

    Ok(())
}
