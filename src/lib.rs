pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, stdio, tooling};
pub use domain::types;
pub use infrastructure::model;
