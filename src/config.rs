//! Ambient build environment.

use std::env;

/// Environment variable consulted for the build mode.
pub const ENV_MODE_VAR: &str = "QUIRE_ENV";

/// Whether the hosting process runs in development mode.
///
/// Development compilers emit source positions in their output so editor
/// tooling can map rendered fragments back to the markdown source. The flag
/// is read from the environment at compiler-construction time and baked into
/// the cached instance.
pub fn development_mode() -> bool {
    env::var(ENV_MODE_VAR)
        .map(|mode| mode == "development")
        .unwrap_or(false)
}
