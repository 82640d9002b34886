pub mod geo;
pub mod track_session;
pub mod trip;
pub mod user;
