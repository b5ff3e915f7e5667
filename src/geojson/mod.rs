mod lines;
mod loader;
mod renderer;
mod style;

pub use lines::*;
pub use loader::*;
pub use renderer::*;
pub use style::*;
