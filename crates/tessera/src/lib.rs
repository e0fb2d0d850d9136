//! ## Crate layout
//! - `core`: value model, converters, provider discovery, settings, queries,
//!   and observability.
//! - `primitives`: the scalar kind registry shared by every layer.
//!
//! The `prelude` module carries the vocabulary used at a query call site.
//! Extension-point traits live in their `core` modules.

pub use tessera_core as core;
pub use tessera_primitives as primitives;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use tessera_core::error::Error;

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::primitives::ScalarKind;
}
