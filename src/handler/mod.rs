pub mod admin;
pub mod auth;
pub mod properties;
pub mod uploads;
pub mod users;
