//! NATS-backed `EventBus` (C3), retry/backoff, and an in-memory test double.

pub mod jetstream;
pub mod memory;
pub mod nats;
pub mod retry;

pub use memory::InMemoryEventBus;
pub use nats::NatsEventBus;
