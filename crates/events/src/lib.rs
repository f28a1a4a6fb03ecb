//! `emporium-events`: event contracts and distribution mechanics.
//!
//! Domain crates implement [`Event`] for their typed events; the engine wraps
//! them into [`EventEnvelope`]s and distributes them over an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
