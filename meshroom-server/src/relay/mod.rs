mod relay;
mod relay_command;
mod relay_handle;
mod session;

pub use relay::*;
pub use relay_command::*;
pub use relay_handle::*;
pub use session::*;
