//! Capability contract consumed by the orchestration runtime.

pub mod arguments;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use tool::Tool;
pub use types::AgentToolParameters;
pub use validation::{validate_arguments, ArgumentValidator, NoValidation, SchemaValidator};
