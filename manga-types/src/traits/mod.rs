//! Capability interfaces, each mockable for handler-level tests.
//!
//! Each trait is `mockall`-automocked behind `cfg(any(test, feature = "mocking"))`
//! so downstream crates can exercise their handler logic against an in-process
//! double instead of a live NATS/DynamoDB/S3/provider connection.

pub mod blob_store;
pub mod event_bus;
pub mod image_gen;
pub mod meta_store;
pub mod text_gen;

pub use blob_store::BlobStore;
pub use event_bus::EventBus;
pub use image_gen::ImageGen;
pub use meta_store::MetaStore;
pub use text_gen::TextGen;

#[cfg(any(test, feature = "mocking"))]
pub use blob_store::MockBlobStore;
#[cfg(any(test, feature = "mocking"))]
pub use event_bus::MockEventBus;
#[cfg(any(test, feature = "mocking"))]
pub use image_gen::MockImageGen;
#[cfg(any(test, feature = "mocking"))]
pub use meta_store::MockMetaStore;
#[cfg(any(test, feature = "mocking"))]
pub use text_gen::MockTextGen;
