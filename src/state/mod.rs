pub mod backend;
pub mod local;
pub mod migration;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod statefile;
