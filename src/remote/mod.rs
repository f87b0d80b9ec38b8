mod failover;


pub use failover::*;
