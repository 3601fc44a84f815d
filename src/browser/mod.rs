pub mod chrome;
pub mod overlay;

pub use chrome::{ChromeDriver, ConnectionMode};
pub use overlay::HighlightOverlay;
