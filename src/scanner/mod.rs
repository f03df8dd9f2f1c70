pub mod grammar;
pub mod attributes;
pub mod events;
pub mod state;
pub mod streaming;
pub mod restore;

#[cfg(test)]
mod tests;

pub use grammar::*;
pub use attributes::*;
pub use events::*;
pub use state::*;
pub use streaming::*;
pub use restore::*;
