mod command;
mod runner;
mod util;

pub use command::{Command, default_destination};
pub use runner::{Console, EXIT_SUCCESS, EXIT_UNEXPECTED, EXIT_USER_ERROR, exit_code, run};
pub use util::format_elapsed;
