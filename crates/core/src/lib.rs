//! Core types for the inbox engine: queue items, pipeline outcomes,
//! inbound message validation, and the text helpers shared by the stages.

pub mod analysis;
pub mod error;
pub mod inbound;
pub mod item;
pub mod limits;
pub mod outcome;
pub mod text;

pub use analysis::*;
pub use error::{Error, Result, ValidationErrorCode};
pub use inbound::*;
pub use item::*;
pub use outcome::*;
