#![doc = include_str!("../README.md")]

//! Formula generation: predicate emitters over a certificate plus the
//! block partitioning driver that feeds the dispatcher.

pub mod blocks;
pub mod errors;
pub mod ops;
mod predicates;
pub mod writer;

pub use blocks::{
    der_block_filename, effective_block_size, generate, sol_filename, solcheck_filename,
    EmitOptions,
};
pub use errors::FormulaError;
pub use ops::Op;
pub use writer::{EmitResult, FormulaWriter};
