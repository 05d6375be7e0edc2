pub mod llm;
pub mod tools;
pub mod agent;
pub mod message;
pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;

// re-export the proc-macro attribute for convenient use: `use mini_toolflow::tool;` or `#[mini_toolflow::tool(...)]`
pub use mini_toolflow_macros::tool;

// Paths used by code generated with `#[tool]`.
#[doc(hidden)]
pub use async_trait;
#[doc(hidden)]
pub use serde;
#[doc(hidden)]
pub use serde_json;

pub use error::{Error, Result};
