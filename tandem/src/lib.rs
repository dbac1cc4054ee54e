pub use tandem_core::{RoomId, SessionId};

pub mod model {
    pub use tandem_core::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tandem_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use tandem_client::*;
}
