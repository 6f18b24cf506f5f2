pub mod alias;
pub mod db;
pub mod error;
pub mod models;
pub mod profile;
pub mod service;
pub mod store;
pub mod sync;
pub mod user_import;
