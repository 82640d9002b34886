use const_format::concatcp;

pub mod auth;
pub mod database;
pub mod gpx_util;
pub mod ride_book;
pub mod save;
pub mod settings;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "ride_book.db");

#[derive(Debug)]
pub enum DataManagerError {
    Database(String),
    Gpx(String),
}

impl std::fmt::Display for DataManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataManagerError::Database(msg) => write!(f, "database error: {msg}"),
            DataManagerError::Gpx(msg) => write!(f, "gpx error: {msg}"),
        }
    }
}

impl std::error::Error for DataManagerError {}
