mod negotiation;
mod orchestrator;
mod session_event;
mod state;

pub use negotiation::*;
pub use orchestrator::*;
pub use session_event::*;
pub use state::*;
