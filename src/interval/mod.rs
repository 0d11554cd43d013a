//! The interval abstract domain and the WPO-scheduled abstract interpreter
//! built over it (spec.md §4.5, §4.6).

pub mod domain;
pub mod interpreter;
