//! Account configuration and validation.

mod model;
mod validation;

pub use model::{Account, Security};
pub use validation::{ValidationError, ValidationResult, validate_account};
