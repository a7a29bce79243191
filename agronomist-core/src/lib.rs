pub mod error;
pub mod key;
pub mod logging;

pub use error::{Error, Result};
pub use key::NamespaceName;
