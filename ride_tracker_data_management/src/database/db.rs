use std::path::PathBuf;

use chrono::{DateTime, Utc};
use const_format::concatcp;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, Pool, Row, Sqlite, SqlitePool,
};
use uuid::Uuid;

use ride_tracker_lib::{
    geo::GeoPoint,
    trip::{ImageRef, Trip, TripSummary},
    user::UserAccount,
};

use crate::{DataManagerError, DATABASE_PATH};

use super::constants::*;

/// A user row together with its password digest material.
pub struct UserCredentials {
    pub account: UserAccount,
    pub password_hash: String,
    pub password_salt: String,
}

#[derive(Clone)]
pub struct TripDatabase {
    pool: Pool<Sqlite>,
}

impl TripDatabase {
    pub async fn connect() -> Result<Self, DataManagerError> {
        let root: PathBuf = project_root::get_project_root()
            .map_err(|_| DataManagerError::Database("Failed to locate project root".to_string()))?;
        let options = SqliteConnectOptions::new()
            .filename(root.join(DATABASE_PATH))
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|_| DataManagerError::Database("Failed to connect to database".to_string()))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Ephemeral database, one connection so every query sees the same
    /// in-memory store. For tests and dry runs.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|_| DataManagerError::Database("Failed to open in-memory database".to_string()))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", USERS_TABLE_NAME, "(",
                USER_ID,       " TEXT PRIMARY KEY,",
                EMAIL,         " TEXT NOT NULL UNIQUE,",
                DISPLAY_NAME,  " TEXT,",
                PASSWORD_HASH, " TEXT NOT NULL,",
                PASSWORD_SALT, " TEXT NOT NULL,",
                CREATED_AT,    " TIMESTAMP NOT NULL);

            CREATE TABLE IF NOT EXISTS ", AUTH_SESSIONS_TABLE_NAME, "(",
                TOKEN,      " TEXT PRIMARY KEY,",
                USER_ID,    " TEXT NOT NULL,",
                CREATED_AT, " TIMESTAMP NOT NULL,
                FOREIGN KEY(", USER_ID, ") REFERENCES ", USERS_TABLE_NAME, "(", USER_ID, ") ON DELETE CASCADE);

            CREATE TABLE IF NOT EXISTS ", RIDES_TABLE_NAME, "(",
                RIDE_ID,    " TEXT PRIMARY KEY,",
                NAME,       " TEXT NOT NULL,",
                DISTANCE,   " REAL NOT NULL,",
                DURATION,   " TEXT NOT NULL,",
                IMAGE_URL,  " TEXT,",
                USER_ID,    " TEXT NOT NULL,",
                CREATED_AT, " TIMESTAMP NOT NULL);

            CREATE TABLE IF NOT EXISTS ", ROUTE_POINTS_TABLE_NAME, "(",
                POINT_RIDE_ID, " TEXT NOT NULL,",
                LATITUDE,      " REAL NOT NULL,",
                LONGITUDE,     " REAL NOT NULL,",
                ORDER_INDEX,   " INTEGER NOT NULL,
                FOREIGN KEY(", POINT_RIDE_ID, ") REFERENCES ", RIDES_TABLE_NAME, "(", RIDE_ID, ") ON DELETE CASCADE);

            CREATE TABLE IF NOT EXISTS ", SETTINGS_TABLE_NAME, "(",
                KEY,   " TEXT PRIMARY KEY,",
                VALUE, " TEXT NOT NULL)"))
            .await
            .map_err(|err| DataManagerError::Database(format!("Failed to initialize schema: {err}")))?;
        Ok(())
    }

    pub async fn insert_ride(&self, user_id: Uuid, trip: &Trip) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", RIDES_TABLE_NAME,
            "(", RIDE_ID, ", ", NAME, ", ", DISTANCE, ", ", DURATION, ", ", IMAGE_URL, ", ", USER_ID, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"))
            .bind(trip.id.to_string())
            .bind(&trip.name)
            .bind(trip.distance_km)
            .bind(&trip.duration)
            .bind(trip.image.as_ref().map(|image| image.0.clone()))
            .bind(user_id.to_string())
            .bind(trip.created_at)
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to insert ride".to_string()))
            .map(|_| ())
    }

    pub async fn insert_route_points(&self, ride_id: Uuid, points: &[GeoPoint]) -> Result<(), DataManagerError> {
        for (index, point) in points.iter().enumerate() {
            query(concatcp!("
                INSERT INTO ", ROUTE_POINTS_TABLE_NAME,
                "(", POINT_RIDE_ID, ", ", LATITUDE, ", ", LONGITUDE, ", ", ORDER_INDEX, ")
                VALUES (?1, ?2, ?3, ?4)"))
                .bind(ride_id.to_string())
                .bind(point.latitude)
                .bind(point.longitude)
                .bind(index as i64)
                .execute(&self.pool).await
                .map_err(|_| DataManagerError::Database(format!("Failed to insert route point {index}")))?;
        }
        Ok(())
    }

    pub async fn get_rides(&self, user_id: Uuid) -> Result<Vec<TripSummary>, DataManagerError> {
        query(concatcp!("
            SELECT ", RIDE_ID, ", ", NAME, ", ", DISTANCE, ", ", DURATION, ", ", IMAGE_URL, ", ", CREATED_AT, "
            FROM ", RIDES_TABLE_NAME, " WHERE ", USER_ID, " = ?1 ORDER BY ", CREATED_AT, " DESC"))
            .bind(user_id.to_string())
            .fetch_all(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get rides".to_string()))?
            .iter()
            .map(summary_from_row)
            .collect()
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> Result<Option<TripSummary>, DataManagerError> {
        query(concatcp!("
            SELECT ", RIDE_ID, ", ", NAME, ", ", DISTANCE, ", ", DURATION, ", ", IMAGE_URL, ", ", CREATED_AT, "
            FROM ", RIDES_TABLE_NAME, " WHERE ", RIDE_ID, " = ?1"))
            .bind(ride_id.to_string())
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get ride".to_string()))?
            .as_ref()
            .map(summary_from_row)
            .transpose()
    }

    pub async fn get_route_points(&self, ride_id: Uuid) -> Result<Vec<GeoPoint>, DataManagerError> {
        query_as::<_, GeoPoint>(concatcp!("
            SELECT ", LATITUDE, ", ", LONGITUDE, " FROM ", ROUTE_POINTS_TABLE_NAME, "
            WHERE ", POINT_RIDE_ID, " = ?1 ORDER BY ", ORDER_INDEX))
            .bind(ride_id.to_string())
            .fetch_all(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get route points".to_string()))
    }

    /// Cascades to the ride's route points.
    pub async fn delete_ride(&self, ride_id: Uuid) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", RIDES_TABLE_NAME, " WHERE ", RIDE_ID, " = ?1"))
            .bind(ride_id.to_string())
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to delete ride".to_string()))
            .map(|_| ())
    }

    pub async fn insert_user(
        &self,
        account: &UserAccount,
        password_hash: &str,
        password_salt: &str,
    ) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", USERS_TABLE_NAME,
            "(", USER_ID, ", ", EMAIL, ", ", DISPLAY_NAME, ", ", PASSWORD_HASH, ", ", PASSWORD_SALT, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)"))
            .bind(account.user_id.to_string())
            .bind(&account.email)
            .bind(account.display_name.as_deref())
            .bind(password_hash)
            .bind(password_salt)
            .bind(account.join_date)
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to insert user".to_string()))
            .map(|_| ())
    }

    pub async fn get_user_credentials(&self, email: &str) -> Result<Option<UserCredentials>, DataManagerError> {
        query(concatcp!("
            SELECT ", USER_ID, ", ", EMAIL, ", ", DISPLAY_NAME, ", ", PASSWORD_HASH, ", ", PASSWORD_SALT, ", ", CREATED_AT, "
            FROM ", USERS_TABLE_NAME, " WHERE ", EMAIL, " = ?1"))
            .bind(email)
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get user".to_string()))?
            .map(|row| {
                Ok(UserCredentials {
                    account: UserAccount {
                        user_id: parse_uuid(row.get(0))?,
                        email: row.get(1),
                        display_name: row.get(2),
                        join_date: row.get(5),
                    },
                    password_hash: row.get(3),
                    password_salt: row.get(4),
                })
            })
            .transpose()
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>, DataManagerError> {
        query(concatcp!("
            SELECT ", USER_ID, ", ", EMAIL, ", ", DISPLAY_NAME, ", ", CREATED_AT, "
            FROM ", USERS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get user".to_string()))?
            .map(|row| {
                Ok(UserAccount {
                    user_id: parse_uuid(row.get(0))?,
                    email: row.get(1),
                    display_name: row.get(2),
                    join_date: row.get(3),
                })
            })
            .transpose()
    }

    pub async fn insert_auth_session(
        &self,
        token: &str,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", AUTH_SESSIONS_TABLE_NAME, "(", TOKEN, ", ", USER_ID, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3)"))
            .bind(token)
            .bind(user_id.to_string())
            .bind(created_at)
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to insert auth session".to_string()))
            .map(|_| ())
    }

    pub async fn delete_auth_session(&self, token: &str) -> Result<(), DataManagerError> {
        query(concatcp!("DELETE FROM ", AUTH_SESSIONS_TABLE_NAME, " WHERE ", TOKEN, " = ?1"))
            .bind(token)
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to delete auth session".to_string()))
            .map(|_| ())
    }

    pub async fn latest_auth_session(&self) -> Result<Option<(String, Uuid)>, DataManagerError> {
        query(concatcp!("
            SELECT ", TOKEN, ", ", USER_ID, " FROM ", AUTH_SESSIONS_TABLE_NAME, "
            ORDER BY ", CREATED_AT, " DESC LIMIT 1"))
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get auth session".to_string()))?
            .map(|row| Ok((row.get(0), parse_uuid(row.get(1))?)))
            .transpose()
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, DataManagerError> {
        query(concatcp!("SELECT ", VALUE, " FROM ", SETTINGS_TABLE_NAME, " WHERE ", KEY, " = ?1"))
            .bind(key)
            .fetch_optional(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to get setting".to_string()))
            .map(|row| row.map(|row| row.get(0)))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), DataManagerError> {
        query(concatcp!("
            INSERT INTO ", SETTINGS_TABLE_NAME, "(", KEY, ", ", VALUE, ") VALUES (?1, ?2)
            ON CONFLICT(", KEY, ") DO UPDATE SET ", VALUE, " = excluded.", VALUE))
            .bind(key)
            .bind(value)
            .execute(&self.pool).await
            .map_err(|_| DataManagerError::Database("Failed to set setting".to_string()))
            .map(|_| ())
    }
}

fn parse_uuid(raw: String) -> Result<Uuid, DataManagerError> {
    Uuid::parse_str(&raw)
        .map_err(|_| DataManagerError::Database(format!("Malformed id in database: {raw}")))
}

fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TripSummary, DataManagerError> {
    let image: Option<String> = row.get(4);
    Ok(TripSummary {
        id: parse_uuid(row.get(0))?,
        name: row.get(1),
        distance_km: row.get(2),
        duration: row.get(3),
        image: image.map(ImageRef),
        created_at: row.get(5),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn test_user() -> UserAccount {
        UserAccount {
            user_id: Uuid::new_v4(),
            email: "rider@example.com".to_string(),
            display_name: Some("Rider".to_string()),
            join_date: Utc::now(),
        }
    }

    fn test_trip(name: &str, created_at: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            name: name.to_string(),
            distance_km: 12.5,
            duration: "42:10".to_string(),
            points: vec![
                GeoPoint::new(47.3769, 8.5417),
                GeoPoint::new(47.3779, 8.5417),
                GeoPoint::new(47.3789, 8.5427),
            ],
            image: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn rides_round_trip_with_point_order() {
        let db = TripDatabase::connect_in_memory().await.unwrap();
        let user = test_user();
        db.insert_user(&user, "hash", "salt").await.unwrap();

        let trip = test_trip("Morning loop", Utc::now());
        db.insert_ride(user.user_id, &trip).await.unwrap();
        db.insert_route_points(trip.id, &trip.points).await.unwrap();

        let summaries = db.get_rides(user.user_id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, trip.id);
        assert_eq!(summaries[0].name, "Morning loop");

        let points = db.get_route_points(trip.id).await.unwrap();
        assert_eq!(points, trip.points);
    }

    #[tokio::test]
    async fn rides_are_listed_most_recent_first() {
        let db = TripDatabase::connect_in_memory().await.unwrap();
        let user = test_user();
        db.insert_user(&user, "hash", "salt").await.unwrap();

        let older = test_trip("Older", Utc::now() - TimeDelta::minutes(10));
        let newer = test_trip("Newer", Utc::now());
        db.insert_ride(user.user_id, &older).await.unwrap();
        db.insert_ride(user.user_id, &newer).await.unwrap();

        let names: Vec<String> = db
            .get_rides(user.user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.name)
            .collect();
        assert_eq!(names, ["Newer", "Older"]);
    }

    #[tokio::test]
    async fn deleting_a_ride_cascades_to_its_points() {
        let db = TripDatabase::connect_in_memory().await.unwrap();
        let user = test_user();
        db.insert_user(&user, "hash", "salt").await.unwrap();

        let trip = test_trip("Morning loop", Utc::now());
        db.insert_ride(user.user_id, &trip).await.unwrap();
        db.insert_route_points(trip.id, &trip.points).await.unwrap();

        db.delete_ride(trip.id).await.unwrap();
        assert!(db.get_rides(user.user_id).await.unwrap().is_empty());
        assert!(db.get_route_points(trip.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_upsert_and_persist() {
        let db = TripDatabase::connect_in_memory().await.unwrap();
        assert_eq!(db.get_setting("dark_mode").await.unwrap(), None);

        db.set_setting("dark_mode", "false").await.unwrap();
        assert_eq!(db.get_setting("dark_mode").await.unwrap(), Some("false".to_string()));

        db.set_setting("dark_mode", "true").await.unwrap();
        assert_eq!(db.get_setting("dark_mode").await.unwrap(), Some("true".to_string()));
    }

    #[tokio::test]
    async fn auth_sessions_return_the_latest() {
        let db = TripDatabase::connect_in_memory().await.unwrap();
        let user = test_user();
        db.insert_user(&user, "hash", "salt").await.unwrap();

        db.insert_auth_session("older", user.user_id, Utc::now() - TimeDelta::hours(1))
            .await
            .unwrap();
        db.insert_auth_session("newer", user.user_id, Utc::now())
            .await
            .unwrap();

        let (token, user_id) = db.latest_auth_session().await.unwrap().unwrap();
        assert_eq!(token, "newer");
        assert_eq!(user_id, user.user_id);

        db.delete_auth_session("newer").await.unwrap();
        let (token, _) = db.latest_auth_session().await.unwrap().unwrap();
        assert_eq!(token, "older");
    }
}
