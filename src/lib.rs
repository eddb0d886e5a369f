pub mod broadcaster;
pub mod clients;
pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod processor;
pub mod session;
pub mod supervisor;
pub mod tracker;
pub mod utils;
