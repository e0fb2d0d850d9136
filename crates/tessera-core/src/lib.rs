//! Core runtime for Tessera: the value model, converter registry, provider
//! discovery, settings, and the query pipeline, plus the ergonomics exported
//! via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod context;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod obs;
pub mod params;
pub mod query;
pub mod settings;
pub mod sort;
pub mod traits;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains the vocabulary an application touches per query.
/// Extension traits and error detail types stay in their modules.
///

pub mod prelude {
    pub use crate::{
        context::Context,
        error::{Error, ErrorClass},
        params::Params,
        query::{DataModel, PreparedStatement, QueryResult, QueryRunner, Record},
        sort::{Direction, Sort, SortList},
        traits::FieldValue,
        value::{Value, ValueBox, ValueType},
    };
}
