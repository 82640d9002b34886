use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use ride_tracker_lib::{
    geo::GeoPoint,
    trip::{Trip, TripSummary},
};
use ride_tracker_recording::store::{StorageError, TripStore};

use crate::{
    auth::AuthManager, database::db::TripDatabase, settings::SettingsStore, DataManagerError,
    DATA_DIR,
};

/// The public interface for all ride tracker data management. Implements
/// the recorder's trip store contract; the current user comes from the auth
/// session, resolved per call.
#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: TripDatabase,
    auth: AuthManager,
}

impl DataManager {
    pub async fn start() -> Result<Self, DataManagerError> {
        // Create the data dir if it doesn't exist.
        let root: PathBuf = project_root::get_project_root()
            .map_err(|_| DataManagerError::Database("Failed to locate project root".to_string()))?;
        let data_dir = root.join(DATA_DIR);
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|_| {
                DataManagerError::Database(format!("Failed to create data directory: {:?}", data_dir))
            })?;
        }

        Ok(Self::with_database(TripDatabase::connect().await?))
    }

    /// Fully in-memory manager for tests and dry runs.
    pub async fn start_in_memory() -> Result<Self, DataManagerError> {
        Ok(Self::with_database(TripDatabase::connect_in_memory().await?))
    }

    fn with_database(database: TripDatabase) -> Self {
        let auth = AuthManager::new(database.clone());
        Self { database, auth }
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.database.clone())
    }

    async fn current_user(&self) -> Result<Uuid, StorageError> {
        self.auth
            .current_session()
            .await
            .map(|session| session.user_id)
            .ok_or_else(|| StorageError("no signed-in user".to_string()))
    }
}

#[async_trait]
impl TripStore for DataManager {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, StorageError> {
        let user_id = self.current_user().await?;
        self.database.get_rides(user_id).await.map_err(storage_err)
    }

    async fn route_points(
        &self,
        trip_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<GeoPoint>>, StorageError> {
        let mut points = HashMap::new();
        for &trip_id in trip_ids {
            points.insert(
                trip_id,
                self.database
                    .get_route_points(trip_id)
                    .await
                    .map_err(storage_err)?,
            );
        }
        Ok(points)
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StorageError> {
        let user_id = self.current_user().await?;
        self.database
            .insert_ride(user_id, trip)
            .await
            .map_err(storage_err)
    }

    async fn insert_route_points(
        &self,
        trip_id: Uuid,
        points: &[GeoPoint],
    ) -> Result<(), StorageError> {
        self.database
            .insert_route_points(trip_id, points)
            .await
            .map_err(storage_err)
    }

    async fn delete_trip(&self, trip_id: Uuid) -> Result<(), StorageError> {
        self.database.delete_ride(trip_id).await.map_err(storage_err)
    }
}

fn storage_err(err: DataManagerError) -> StorageError {
    StorageError(format!("{err}"))
}
