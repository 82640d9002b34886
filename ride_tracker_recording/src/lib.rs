pub mod finalizer;
pub mod position_stream;
pub mod sample_clock;
pub mod simulated;
pub mod store;
pub mod track_recorder;

pub use track_recorder::{RecorderConfig, RecordingError, TrackRecorder};
