pub mod agent;
pub mod stdio;
pub mod tooling;
