// Use cases layer: simulation loop, steering arbitration, fan-out membership.

pub mod game;
pub mod input;
pub mod subscribers;
pub mod types;

pub use input::DirectionArbiter;
pub use subscribers::{SubscriberId, SubscriberRegistry};
pub use types::DirectionRequest;
