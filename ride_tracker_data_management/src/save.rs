use async_trait::async_trait;

use ride_tracker_lib::{
    track_session::TrackSession,
    trip::{ImageRef, Trip},
};
use ride_tracker_recording::{
    finalizer::{self, FinalizeError},
    store::StorageError,
};

use crate::ride_book::RideBook;

/// The device image-capture collaborator. `None` means the user cancelled.
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick_from_library(&self) -> Option<ImageRef>;
    async fn capture_from_camera(&self) -> Option<ImageRef>;
}

#[derive(Debug)]
pub enum SaveError {
    Validation(FinalizeError),
    Storage(StorageError),
}

impl From<FinalizeError> for SaveError {
    fn from(err: FinalizeError) -> Self {
        SaveError::Validation(err)
    }
}

impl From<StorageError> for SaveError {
    fn from(err: StorageError) -> Self {
        SaveError::Storage(err)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Validation(err) => write!(f, "{err}"),
            SaveError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SaveError {}

/// State of the "save this ride" dialog, minus the rendering: the entered
/// name and the optionally picked image.
#[derive(Default)]
pub struct RideSaveForm {
    name: String,
    image: Option<ImageRef>,
}

impl RideSaveForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// Cancelling keeps the current choice.
    pub async fn pick_image(&mut self, picker: &dyn ImagePicker) {
        if let Some(image) = picker.pick_from_library().await {
            self.image = Some(image);
        }
    }

    /// Cancelling keeps the current choice.
    pub async fn take_photo(&mut self, picker: &dyn ImagePicker) {
        if let Some(image) = picker.capture_from_camera().await {
            self.image = Some(image);
        }
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Finalizes the stopped session and persists it through the ride book.
    /// The form is cleared only on success; a rejected name leaves it
    /// editable and the session saveable.
    pub async fn save(
        &mut self,
        session: &TrackSession,
        ride_book: &mut RideBook,
    ) -> Result<Trip, SaveError> {
        let trip = finalizer::finalize(session, &self.name, self.image.clone())?;
        ride_book.add(trip.clone()).await?;

        self.name.clear();
        self.image = None;
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use ride_tracker_lib::geo::GeoPoint;
    use ride_tracker_recording::store::TripStore;

    use crate::DataManager;

    use super::*;

    struct FakePicker {
        library: Option<ImageRef>,
        camera: Option<ImageRef>,
    }

    #[async_trait]
    impl ImagePicker for FakePicker {
        async fn pick_from_library(&self) -> Option<ImageRef> {
            self.library.clone()
        }

        async fn capture_from_camera(&self) -> Option<ImageRef> {
            self.camera.clone()
        }
    }

    fn stopped_session() -> TrackSession {
        let mut session = TrackSession::new();
        session
            .start(GeoPoint::new(47.3769, 8.5417), Utc::now())
            .unwrap();
        session.apply_sample(GeoPoint::new(47.3779, 8.5417));
        for _ in 0..90 {
            session.apply_tick();
        }
        session.stop().unwrap();
        session
    }

    async fn signed_in_book() -> (DataManager, RideBook) {
        let data_manager = DataManager::start_in_memory().await.unwrap();
        data_manager
            .auth()
            .sign_up("rider@example.com", "secret", None)
            .await
            .unwrap();
        data_manager
            .auth()
            .sign_in("rider@example.com", "secret")
            .await
            .unwrap();
        let book = RideBook::new(data_manager.clone());
        (data_manager, book)
    }

    #[tokio::test]
    async fn empty_name_blocks_persistence() {
        let (data_manager, mut book) = signed_in_book().await;
        let session = stopped_session();
        let mut form = RideSaveForm::new();
        form.set_name("   ");

        match form.save(&session, &mut book).await {
            Err(SaveError::Validation(FinalizeError::EmptyName)) => {}
            other => panic!("expected EmptyName, got {other:?}"),
        }
        assert!(book.rides().is_empty());
        assert!(data_manager.list_trips().await.unwrap().is_empty());
        // The form keeps its input for correction.
        assert_eq!(form.name(), "   ");
    }

    #[tokio::test]
    async fn cancelled_picker_keeps_the_current_image() {
        let mut form = RideSaveForm::new();
        let picker = FakePicker {
            library: Some(ImageRef("file:///ride.jpg".to_string())),
            camera: None,
        };

        form.pick_image(&picker).await;
        assert_eq!(form.image(), Some(&ImageRef("file:///ride.jpg".to_string())));

        // Camera cancelled: the library pick stays.
        form.take_photo(&picker).await;
        assert_eq!(form.image(), Some(&ImageRef("file:///ride.jpg".to_string())));

        form.clear_image();
        assert_eq!(form.image(), None);
    }

    #[tokio::test]
    async fn successful_save_persists_and_clears_the_form() {
        let (data_manager, mut book) = signed_in_book().await;
        let session = stopped_session();
        let mut form = RideSaveForm::new();
        form.set_name("Lakeside loop");
        let picker = FakePicker {
            library: Some(ImageRef("file:///lake.jpg".to_string())),
            camera: None,
        };
        form.pick_image(&picker).await;

        let trip = form.save(&session, &mut book).await.unwrap();
        assert_eq!(trip.name, "Lakeside loop");
        assert_eq!(trip.duration, "01:30");
        assert_eq!(trip.image, Some(ImageRef("file:///lake.jpg".to_string())));

        assert_eq!(form.name(), "");
        assert_eq!(form.image(), None);

        let summaries = data_manager.list_trips().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "Lakeside loop");
        let points = data_manager.route_points(&[trip.id]).await.unwrap();
        assert_eq!(points[&trip.id], trip.points);
    }
}
