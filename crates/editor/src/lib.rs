pub mod config;
pub mod editor;
pub mod transform;

pub use config::*;
pub use editor::*;
pub use transform::*;
