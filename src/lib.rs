#![crate_type = "lib"]
#![crate_name = "weaveq"]

pub mod accessor;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod index;
pub mod logging;
pub mod parser;
pub mod relation;
pub mod result;
pub mod source;
pub mod value;

pub use builder::{seed, Builder};
pub use error::{Error, Result};
