//! Instruction encoding (§4.7) and disassembly for the Flitter virtual
//! machine. Depends only on `flitter-core` — instructions carry `Vector`,
//! `NodeRef`, and `Query` payloads but no compiler- or VM-level types.

pub mod dump;
pub mod instruction;

pub use instruction::{Instruction, Jump, Label, Names};
