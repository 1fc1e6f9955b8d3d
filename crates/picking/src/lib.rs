pub mod input;
pub mod ray;
pub mod terrain;
pub mod tool;

pub use input::*;
pub use ray::*;
pub use terrain::*;
pub use tool::*;
