pub mod entities;
pub mod entity;
pub mod history;
pub mod registry;
pub mod selection;
pub mod store;

pub use entities::*;
pub use entity::*;
pub use history::*;
pub use registry::*;
pub use selection::{SelectedEntity, SelectedObject};
pub use store::*;
