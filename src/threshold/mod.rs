mod engine;
mod values;

#[cfg(test)]
mod engine_test;

pub use engine::*;
pub use values::*;
