//! Embassy async tasks

pub mod console;
pub mod poll;

pub use console::console_task;
pub use poll::poll_task;
