//! Intermediate representation
//!
//! A small basic-block IR for the compiled program. It is designed to be:
//! - Easy to generate from the validated AST
//! - Easy to serialize to a human-readable text form (the emitted artifact)
//! - Structurally checkable: every block ends in exactly one terminator,
//!   every branch target and callee must resolve
//!
//! All dynamic-value work happens through calls into the fixed runtime ABI
//! (`value_*`, `array_*`, and the synthesized `{object}_{member}` symbols);
//! the IR itself only moves opaque handles around.

mod builder;
mod instr;
mod lower;
mod types;

// Re-export in logical order
pub use builder::*;
pub use instr::*;
pub use lower::*;
pub use types::*;
