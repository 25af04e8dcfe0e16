//! Static extraction of drive-routine calls from hub mission scripts.
//!
//! Mission scripts are plain source files whose runnable routines are
//! top-level functions named with a common suffix (`_main` by default).
//! [`extract`] tokenizes the file, walks every call inside those routines and
//! turns each one into an [`Instruction`]: literal arguments are resolved,
//! anything else (closures, variables, expressions) is kept as source text.
//! Calls are classified against a fixed table; unknown or malformed calls
//! survive as [`InstructionKind::RawCall`] so extraction never aborts.

pub mod classify;
pub mod extract;
pub mod instruction;
pub mod lexer;

pub use classify::{InstructionKind, KNOWN_CALLS, classify};
pub use extract::{RoutineFilter, extract, extract_routine, group_by_routine, routines};
pub use instruction::{Instruction, Literal};
