//! slip-read - Reader and Printer
//!
//! The character-stream reader that parses source text into cons-cell
//! graphs, and the pretty-printer that renders values back out. Both
//! sides allocate and resolve values through a `slip_core::Heap`; the
//! reader never evaluates anything.

pub mod printer;
pub mod reader;

pub use printer::{print_value, write_value};
pub use reader::{read, ReadError, ReadOutcome};
