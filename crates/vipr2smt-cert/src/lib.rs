#![doc = include_str!("../README.md")]

//! Certificate front end: tokenization, parsing, model, and the
//! assumption-dependency engine.
//!
//! The pipeline is `reader` → `parser` → [`model::Certificate`] →
//! [`deps`]; the formula crate consumes the finished certificate
//! read-only.

pub mod arena;
pub mod deps;
pub mod errors;
pub mod model;
pub mod number;
pub mod parser;
pub mod reader;
pub mod render;

pub use arena::{StringArena, Sym};
pub use errors::{ModelError, ParseError};
pub use model::{Certificate, Constraint, Derivation, Direction, Reason, ReasonKind, Solution};
pub use number::Num;
