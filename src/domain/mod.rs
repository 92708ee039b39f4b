//! Domain layer: entities, value objects and the booking state machine.
//!
//! Nothing in here touches storage directly. Persistence is reached through
//! the traits in [`ports`], implemented by the infrastructure layer.

pub mod audit;
pub mod booking;
pub mod clock;
pub mod fare;
pub mod money;
pub mod package;
pub mod page;
pub mod ports;
pub mod user;
