// Interface adapters: wire protocol and network handling.

pub mod net;
pub mod protocol;
pub mod state;

pub use net::{snapshot_fanout, ws_handler};
pub use state::AppState;
