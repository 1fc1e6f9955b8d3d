pub mod ecef;
pub mod geodesy;
pub mod local;
pub mod orientation;
pub mod projection;
pub mod quat;
pub mod somerc;
pub mod tmerc;
pub mod vec;

pub use ecef::*;
pub use geodesy::*;
pub use local::*;
pub use orientation::*;
pub use projection::*;
pub use quat::*;
pub use vec::*;
