pub mod data;
pub mod config;

pub use data::*;
pub use config::*;
