//! Request context: token estimates and the history window.

pub mod token;
pub mod window;

pub use window::HistoryWindow;
