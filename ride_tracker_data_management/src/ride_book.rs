use uuid::Uuid;

use ride_tracker_lib::trip::{format_duration, parse_duration, Trip};
use ride_tracker_recording::{
    finalizer,
    store::{StorageError, TripStore},
};

use crate::DataManager;

/// Locally cached projection of the signed-in user's saved rides. The store
/// stays the source of truth; `load` rebuilds the cache from it.
pub struct RideBook {
    data_manager: DataManager,
    rides: Vec<Trip>,
}

/// Simple reductions over the cached ride list.
#[derive(Debug, Clone, PartialEq)]
pub struct RideTotals {
    pub trips: usize,
    pub distance_km: f64,
    pub duration: String,
}

impl RideBook {
    pub fn new(data_manager: DataManager) -> Self {
        Self {
            data_manager,
            rides: Vec::new(),
        }
    }

    /// Most recent first.
    pub fn rides(&self) -> &[Trip] {
        &self.rides
    }

    pub fn get(&self, trip_id: Uuid) -> Option<&Trip> {
        self.rides.iter().find(|ride| ride.id == trip_id)
    }

    /// Replaces the cache with the stored rides and their ordered points.
    pub async fn load(&mut self) -> Result<(), StorageError> {
        let summaries = self.data_manager.list_trips().await?;
        let ids: Vec<Uuid> = summaries.iter().map(|summary| summary.id).collect();
        let mut points = self.data_manager.route_points(&ids).await?;

        self.rides = summaries
            .into_iter()
            .map(|summary| {
                let route = points.remove(&summary.id).unwrap_or_default();
                Trip::from_parts(summary, route)
            })
            .collect();
        Ok(())
    }

    /// Front-inserts into the cache, then persists. The cached ride
    /// survives a failed remote write; the failure is logged and returned.
    pub async fn add(&mut self, trip: Trip) -> Result<(), StorageError> {
        self.rides.insert(0, trip.clone());
        if let Err(err) = finalizer::save_trip(&self.data_manager, &trip).await {
            tracing::error!("failed to persist ride {}: {err}", trip.id);
            return Err(err);
        }
        Ok(())
    }

    pub async fn delete(&mut self, trip_id: Uuid) -> Result<(), StorageError> {
        self.data_manager.delete_trip(trip_id).await?;
        self.rides.retain(|ride| ride.id != trip_id);
        Ok(())
    }

    pub fn totals(&self) -> RideTotals {
        let distance_km = self.rides.iter().map(|ride| ride.distance_km).sum();
        let seconds = self
            .rides
            .iter()
            .filter_map(|ride| parse_duration(&ride.duration))
            .sum();
        RideTotals {
            trips: self.rides.len(),
            distance_km,
            duration: format_duration(seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use ride_tracker_lib::geo::GeoPoint;

    use super::*;

    async fn signed_in_manager() -> DataManager {
        let data_manager = DataManager::start_in_memory().await.unwrap();
        data_manager
            .auth()
            .sign_up("rider@example.com", "secret", Some("Rider"))
            .await
            .unwrap();
        data_manager
            .auth()
            .sign_in("rider@example.com", "secret")
            .await
            .unwrap();
        data_manager
    }

    fn trip(name: &str, minutes_ago: i64, duration: &str, distance_km: f64) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            name: name.to_string(),
            distance_km,
            duration: duration.to_string(),
            points: vec![
                GeoPoint::new(47.3769, 8.5417),
                GeoPoint::new(47.3779, 8.5417),
            ],
            image: None,
            created_at: Utc::now() - TimeDelta::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn add_persists_and_load_rebuilds_in_recency_order() {
        let data_manager = signed_in_manager().await;
        let mut book = RideBook::new(data_manager.clone());

        let older = trip("Older", 30, "10:00", 5.0);
        let newer = trip("Newer", 0, "20:00", 7.5);
        book.add(older.clone()).await.unwrap();
        book.add(newer.clone()).await.unwrap();

        let mut fresh = RideBook::new(data_manager);
        fresh.load().await.unwrap();

        let names: Vec<&str> = fresh.rides().iter().map(|ride| ride.name.as_str()).collect();
        assert_eq!(names, ["Newer", "Older"]);
        assert_eq!(fresh.get(older.id).unwrap().points, older.points);
    }

    #[tokio::test]
    async fn delete_removes_from_store_and_cache() {
        let data_manager = signed_in_manager().await;
        let mut book = RideBook::new(data_manager.clone());
        let ride = trip("Morning loop", 0, "10:00", 5.0);
        book.add(ride.clone()).await.unwrap();

        book.delete(ride.id).await.unwrap();
        assert!(book.rides().is_empty());

        let mut fresh = RideBook::new(data_manager);
        fresh.load().await.unwrap();
        assert!(fresh.rides().is_empty());
    }

    #[tokio::test]
    async fn totals_sum_the_cached_rides() {
        let data_manager = signed_in_manager().await;
        let mut book = RideBook::new(data_manager);
        book.add(trip("One", 10, "30:00", 10.0)).await.unwrap();
        book.add(trip("Two", 0, "45:30", 12.5)).await.unwrap();

        let totals = book.totals();
        assert_eq!(totals.trips, 2);
        assert!((totals.distance_km - 22.5).abs() < 1e-9);
        assert_eq!(totals.duration, "01:15:30");
    }
}
