pub mod error;

pub use error::{Error, FieldError, Result};
