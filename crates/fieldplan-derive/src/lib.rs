//! Derive macros for fieldplan
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model;

/// Derive `Model` metadata and a field reference type for a struct.
///
/// # Example
///
/// ```ignore
/// use fieldplan::prelude::*;
///
/// #[derive(Debug, Default, Serialize, Deserialize, Model)]
/// #[orm(table = "players")]
/// struct Player {
///     #[orm(id)]
///     id: i64,
///     #[orm(column = "display_name")]
///     name: String,
///     team_id: Option<i64>,
///     #[orm(belongs_to = "team_id")]
///     team: Option<Team>,
/// }
/// ```
///
/// # Generated
///
/// - `PlayerRef` - one `Field<T>` per column and one `Rel<M>` per relation
/// - `impl Model for Player` - a `'static` table descriptor built on first use
/// - `impl Target for PlayerRef`
///
/// # Attributes
///
/// Struct level:
/// - `#[orm(table = "name")]` - Table name (default: snake_case struct name)
/// - `#[orm(schema = "name")]` - Schema qualifier
///
/// Field level:
/// - `#[orm(id)]` - Primary key; rows sharing it are merged on decode
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(transient)]` - Addressable by identity, never queried
/// - `#[orm(referenced_by = "col")]` - Another table stores this value in `col`
/// - `#[orm(belongs_to = "fk")]` - This table's `fk` points at the related row
///   (`references = "col"` names the related key, default `id`)
/// - `#[orm(has_many = "fk")]` - Related rows point here through their `fk`
///   (`key = "col"` names the local key, default `id`)
/// - `#[orm(join_prefix = "p_")]` - Alias prefix for related columns
///   (default: field name followed by `_`)
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
