mod errors;
mod execution;
mod models;
mod runner;
mod session;


pub use errors::AgentError;
pub use models::{AgentOptions, AgentOutcome, AgentStep};
pub use runner::Agent;
pub use session::AgentSession;
