mod feature_types;
mod viewport_types;

pub use feature_types::*;
pub use viewport_types::*;
