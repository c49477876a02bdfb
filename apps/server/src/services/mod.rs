pub mod engine;

pub use engine::{engine_from_context, Engine};
