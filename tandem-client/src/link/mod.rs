mod link_actor;
mod link_state;

pub use link_actor::*;
pub use link_state::*;
