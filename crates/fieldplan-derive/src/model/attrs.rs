//! Attribute parsing for the Model derive macro.
//!
//! Handles struct-level and field-level `#[orm(...)]` attributes.

use heck::ToSnakeCase;
use syn::meta::ParseNestedMeta;
use syn::{DeriveInput, LitStr, Result};

/// Struct-level attributes.
pub(super) struct TableAttr {
    pub table: String,
    pub schema: Option<String>,
}

/// Read `#[orm(table = "...", schema = "...")]`, defaulting the table name
/// to the snake_case struct name.
pub(super) fn get_table_attr(input: &DeriveInput) -> Result<TableAttr> {
    let mut table = None;
    let mut schema = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(string_value(&meta)?);
            } else if meta.path.is_ident("schema") {
                schema = Some(string_value(&meta)?);
            } else {
                return Err(meta.error("expected `table` or `schema`"));
            }
            Ok(())
        })?;
    }

    Ok(TableAttr {
        table: table.unwrap_or_else(|| input.ident.to_string().to_snake_case()),
        schema,
    })
}

/// How a relation field links the two tables.
pub(super) enum RelationAttr {
    /// This table holds `foreign_key`, pointing at the related `references`.
    BelongsTo {
        foreign_key: String,
        references: String,
    },
    /// The related table holds `foreign_key`, pointing at the local `key`.
    HasMany { foreign_key: String, key: String },
}

/// Field-level attributes.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub is_id: bool,
    pub transient: bool,
    pub column: Option<String>,
    pub join_prefix: Option<String>,
    pub referenced_by: Vec<String>,
    belongs_to: Option<String>,
    references: Option<String>,
    has_many: Option<String>,
    key: Option<String>,
}

impl FieldAttr {
    pub(super) fn from_field(field: &syn::Field) -> Result<Self> {
        let mut parsed = FieldAttr::default();

        for attr in &field.attrs {
            if !attr.path().is_ident("orm") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                let path = &meta.path;
                if path.is_ident("id") {
                    parsed.is_id = true;
                } else if path.is_ident("transient") {
                    parsed.transient = true;
                } else if path.is_ident("column") {
                    parsed.column = Some(string_value(&meta)?);
                } else if path.is_ident("join_prefix") {
                    parsed.join_prefix = Some(string_value(&meta)?);
                } else if path.is_ident("referenced_by") {
                    parsed.referenced_by.push(string_value(&meta)?);
                } else if path.is_ident("belongs_to") {
                    parsed.belongs_to = Some(string_value(&meta)?);
                } else if path.is_ident("references") {
                    parsed.references = Some(string_value(&meta)?);
                } else if path.is_ident("has_many") {
                    parsed.has_many = Some(string_value(&meta)?);
                } else if path.is_ident("key") {
                    parsed.key = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("unsupported orm field attribute"));
                }
                Ok(())
            })?;
        }

        parsed.validate(field)?;
        Ok(parsed)
    }

    fn validate(&self, field: &syn::Field) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(syn::Error::new_spanned(field, msg)) };
        if self.belongs_to.is_some() && self.has_many.is_some() {
            return fail("a field cannot be both belongs_to and has_many");
        }
        if self.references.is_some() && self.belongs_to.is_none() {
            return fail("`references` requires `belongs_to`");
        }
        if self.key.is_some() && self.has_many.is_none() {
            return fail("`key` requires `has_many`");
        }
        if self.join_prefix.is_some() && self.relation().is_none() {
            return fail("`join_prefix` only applies to relation fields");
        }
        if self.relation().is_some() && (self.is_id || self.transient) {
            return fail("relation fields cannot be `id` or `transient`");
        }
        Ok(())
    }

    pub(super) fn relation(&self) -> Option<RelationAttr> {
        if let Some(foreign_key) = &self.belongs_to {
            return Some(RelationAttr::BelongsTo {
                foreign_key: foreign_key.clone(),
                references: self.references.clone().unwrap_or_else(|| "id".to_string()),
            });
        }
        self.has_many.as_ref().map(|foreign_key| RelationAttr::HasMany {
            foreign_key: foreign_key.clone(),
            key: self.key.clone().unwrap_or_else(|| "id".to_string()),
        })
    }
}

fn string_value(meta: &ParseNestedMeta) -> Result<String> {
    Ok(meta.value()?.parse::<LitStr>()?.value())
}
