pub mod observer;
pub mod persistence;
pub mod registry;

pub use observer::*;
pub use persistence::*;
pub use registry::*;
