#![allow(dead_code)]

pub const RIDES_TABLE_NAME: &str = "rides";
pub const RIDE_ID: &str = "id";
pub const NAME: &str = "name";
pub const DISTANCE: &str = "distance";
pub const DURATION: &str = "duration";
pub const IMAGE_URL: &str = "image_url";
pub const CREATED_AT: &str = "created_at";

pub const ROUTE_POINTS_TABLE_NAME: &str = "route_points";
pub const POINT_RIDE_ID: &str = "ride_id";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ORDER_INDEX: &str = "order_index";

pub const USERS_TABLE_NAME: &str = "users";
pub const USER_ID: &str = "user_id";
pub const EMAIL: &str = "email";
pub const DISPLAY_NAME: &str = "display_name";
pub const PASSWORD_HASH: &str = "password_hash";
pub const PASSWORD_SALT: &str = "password_salt";

pub const AUTH_SESSIONS_TABLE_NAME: &str = "auth_sessions";
pub const TOKEN: &str = "token";

pub const SETTINGS_TABLE_NAME: &str = "settings";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";
