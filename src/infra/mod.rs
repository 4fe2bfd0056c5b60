pub mod db;
pub mod messaging;
pub mod store;
