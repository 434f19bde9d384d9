mod init;
mod span;

pub use init::init_logger;
pub use span::{child_span, task_span};
