pub mod registry;

pub use registry::{CompilerCache, shared_cache};
