//! Core library for Ravel, an interactive binary and live-process analysis
//! tool. See `README`/`SPEC_FULL.md` for the component map; modules here
//! correspond 1:1 with the spec's C1-C9 components.

pub mod context;
pub mod disasm;
pub mod error;
pub mod parsers;
pub mod platform;
pub mod process_info;
pub mod scanner;
pub mod strings;
pub mod target;
pub mod xref;

pub use context::RavelContext;
pub use error::{RavelError, RavelResult};
pub use target::Target;
