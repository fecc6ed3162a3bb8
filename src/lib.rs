pub mod addrs;
pub mod command;
pub mod config;
pub mod error;
pub mod hcl;
pub mod jsonplan;
pub mod output;
pub mod plans;
pub mod provider;
pub mod state;

pub use error::ShowError;
