//! Pure data types for pyrite: script values and errors.
//!
//! This crate is a leaf dependency with no interpreter, no threads, no I/O.
//! It exists so that hosts embedding pyrite can work with script results and
//! errors without pulling in the RustPython virtual machine.

pub mod error;
pub mod value;

// Flat re-exports for convenience
pub use error::*;
pub use value::*;
