// src/models/mod.rs
pub mod driver;
pub mod messages;
pub mod ride;

pub use driver::*;
pub use messages::*;
pub use ride::*;
