pub mod args;
pub mod config;
pub mod demangle;
pub mod elf;
pub mod error;
pub mod libs;
pub mod render;
pub mod symbol;
pub mod syms;
pub mod table;

pub use crate::error::{Error, ErrorKind, FormatError, Result};
