pub mod core;
pub mod window;

pub use core::{classify_lvr, lvr, mad, median, z_score};
pub use window::RollingWindow;
