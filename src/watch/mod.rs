mod counter;
mod gauge;
mod sampled;
mod stopwatch;
mod watch;


pub use counter::*;
pub use gauge::*;
pub use sampled::*;
pub use stopwatch::*;
pub use watch::*;
