pub mod core;
pub mod reportcard;
pub mod snapshot;
