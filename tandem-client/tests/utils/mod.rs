pub mod relay;

pub use memory_channel::*;
pub use relay::*;
