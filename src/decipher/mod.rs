//! Signature-descrambling routine recovery from untrusted program text

pub mod extract;
pub mod program;

pub use extract::{extract, Extraction};
pub use program::{compile, DecipherRoutine};
