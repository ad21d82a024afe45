//! Production `TextGen`/`ImageGen` adapters backed by plain HTTP provider
//! APIs. Both traits are opaque capabilities per the pipeline's design: this
//! crate owns the wire format of exactly one reasonable provider shape
//! (JSON request/response over `reqwest`) and maps provider failures onto
//! the shared `MangaError` taxonomy so `pipeline-core`'s handlers don't need
//! to know anything providers-specific.

mod common;
pub mod config;
pub mod image_gen;
pub mod text_gen;

pub use config::{ImageGenConfig, TextGenConfig};
pub use image_gen::HttpImageGen;
pub use text_gen::HttpTextGen;
