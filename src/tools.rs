pub mod traits;
pub mod schema;
pub mod output;
pub mod registry;
pub mod error;

pub use traits::Tool;
pub use schema::{ArgSchema, ToolSchema};
pub use output::{ToolOutput, render_outputs};
pub use registry::{ToolSet, merge_parameters};
pub use error::ToolError;
