pub mod diagnostics;
pub mod system_builder;
pub mod system_validator;

pub use diagnostics::{BuildStats, DatasetStats};
pub use system_builder::SystemBuilder;
pub use system_validator::{validate_system, ValidationConfig};
