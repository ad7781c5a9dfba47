//! Domain types for GapLab

pub mod bar;
pub mod session;
pub mod trade;

pub use bar::Bar;
pub use session::SessionWindow;
pub use trade::{ExitReason, Trade};
