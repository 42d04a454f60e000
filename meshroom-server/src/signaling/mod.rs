mod session_directory;
mod ws_handler;

pub use session_directory::*;
pub use ws_handler::*;
