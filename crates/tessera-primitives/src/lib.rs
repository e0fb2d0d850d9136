//! Scalar kind registry shared by the value model and the converter layer.
//!
//! Every capability question about a scalar kind is answered from the single
//! `scalar_kind_registry!` table in `macros.rs`.

#[macro_use]
mod macros;

use std::fmt;

///
/// ScalarKind
///
/// Canonical scalar kind used for shared capability metadata.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ScalarKind {
    Blob,
    Bool,
    Date,
    Float64,
    Int,
    Text,
    Uint,
    Ulid,
}

impl ScalarKind {
    /// Return the full metadata descriptor for one scalar kind.
    #[must_use]
    pub const fn metadata(self) -> ScalarMetadata {
        scalar_kind_registry!(metadata_from_registry, self)
    }

    /// Stable display name, matching the variant name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        scalar_kind_registry!(name_from_registry, self)
    }

    /// Return the coarse routing family for this scalar kind.
    #[must_use]
    pub const fn family(self) -> ScalarFamily {
        self.metadata().family
    }

    /// Return whether this scalar participates in numeric comparison.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.metadata().is_numeric
    }

    /// Return whether this scalar supports ordering predicates and sorts.
    #[must_use]
    pub const fn supports_ordering(self) -> bool {
        self.metadata().supports_ordering
    }

    /// Return whether this scalar may be used as a key-value key.
    #[must_use]
    pub const fn is_keyable(self) -> bool {
        self.metadata().is_keyable
    }

    /// Return whether backends store this scalar without a writer conversion.
    #[must_use]
    pub const fn is_backend_native(self) -> bool {
        self.metadata().is_backend_native
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

///
/// ScalarMetadata
///
/// Capability metadata shared across the value and converter layers.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ScalarMetadata {
    pub family: ScalarFamily,
    pub is_numeric: bool,
    pub supports_ordering: bool,
    pub is_keyable: bool,
    pub is_backend_native: bool,
}

///
/// ScalarFamily
///
/// Coarse scalar routing family used by converter capability checks.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarFamily {
    Blob,
    Bool,
    Identifier,
    Numeric,
    Temporal,
    Textual,
}

/// Ordered list of all scalar kinds in registry order.
pub const ALL_SCALAR_KINDS: [ScalarKind; 8] = scalar_kind_registry!(all_kinds_from_registry);
