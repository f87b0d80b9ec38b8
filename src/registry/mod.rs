mod registration;
mod registry;


pub use registration::*;
pub use registry::*;
