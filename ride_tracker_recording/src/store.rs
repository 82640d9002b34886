use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use ride_tracker_lib::{
    geo::GeoPoint,
    trip::{Trip, TripSummary},
};

/// Failure talking to the trip store. Logged and surfaced, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.0)
    }
}

impl std::error::Error for StorageError {}

/// The external trip storage collaborator. Route points travel with an
/// explicit order index; relational stores do not guarantee list order
/// otherwise.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Saved trips for the current user, most recent first.
    async fn list_trips(&self) -> Result<Vec<TripSummary>, StorageError>;

    /// Ordered route points for each of the given trips.
    async fn route_points(
        &self,
        trip_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<GeoPoint>>, StorageError>;

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StorageError>;

    /// Inserts the points in sample order, one order index per point.
    async fn insert_route_points(
        &self,
        trip_id: Uuid,
        points: &[GeoPoint],
    ) -> Result<(), StorageError>;

    /// Deletes the trip and, by cascade, its route points.
    async fn delete_trip(&self, trip_id: Uuid) -> Result<(), StorageError>;
}
