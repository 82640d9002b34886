use crate::{database::db::TripDatabase, DataManagerError};

pub const DARK_MODE_KEY: &str = "dark_mode";

/// Device-local key-value settings, persisted across restarts.
#[derive(Clone)]
pub struct SettingsStore {
    database: TripDatabase,
}

impl SettingsStore {
    pub fn new(database: TripDatabase) -> Self {
        Self { database }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, DataManagerError> {
        self.database.get_setting(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), DataManagerError> {
        self.database.set_setting(key, value).await
    }

    /// Dark mode defaults to on until the user toggles it.
    pub async fn dark_mode(&self) -> Result<bool, DataManagerError> {
        Ok(self
            .get(DARK_MODE_KEY)
            .await?
            .map(|value| value == "true")
            .unwrap_or(true))
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> Result<(), DataManagerError> {
        self.set(DARK_MODE_KEY, if enabled { "true" } else { "false" })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dark_mode_defaults_on_and_persists_toggles() {
        let settings = SettingsStore::new(TripDatabase::connect_in_memory().await.unwrap());
        assert!(settings.dark_mode().await.unwrap());

        settings.set_dark_mode(false).await.unwrap();
        assert!(!settings.dark_mode().await.unwrap());

        settings.set_dark_mode(true).await.unwrap();
        assert!(settings.dark_mode().await.unwrap());
    }
}
