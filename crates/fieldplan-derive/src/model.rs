//! Model derive macro implementation
//!
//! ## Module Structure
//!
//! - `attrs`: Struct and field attribute parsing
//! - `types`: Wrapper type peeling (`Option`, `Box`, `Vec`)

mod attrs;
mod types;

use attrs::{FieldAttr, RelationAttr, get_table_attr};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

/// Generated pieces for one struct field.
struct FieldParts {
    /// Declaration in the reference struct.
    decl: TokenStream,
    /// Initializer in `build_ref`.
    init: TokenStream,
    /// `ColumnDef` expression for the table descriptor.
    column: TokenStream,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let table_attr = get_table_attr(&input)?;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let mut decls = Vec::with_capacity(fields.len());
    let mut inits = Vec::with_capacity(fields.len());
    let mut columns = Vec::with_capacity(fields.len());
    let mut idents = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let parts = field_parts(field, ident)?;
        decls.push(parts.decl);
        inits.push(parts.init);
        columns.push(parts.column);
        idents.push(ident);
    }

    let ref_name = format_ident!("{}Ref", name);
    let ref_doc = format!("Field handles of [`{name}`], one per column.");
    let table = &table_attr.table;
    let schema = table_attr
        .schema
        .as_ref()
        .map(|schema| quote! { .schema(#schema) });

    Ok(quote! {
        #[doc = #ref_doc]
        #vis struct #ref_name {
            __token: ::fieldplan::FieldToken,
            #(#decls,)*
        }

        impl ::fieldplan::Target for #ref_name {
            type Model = #name;

            fn target_token(&self) -> ::fieldplan::FieldToken {
                self.__token
            }

            fn column_tokens(&self) -> ::std::vec::Vec<::fieldplan::FieldToken> {
                ::std::vec![#(self.#idents.token()),*]
            }
        }

        impl ::fieldplan::Model for #name {
            type Ref = #ref_name;

            fn table_def() -> &'static ::fieldplan::TableDef {
                static DEF: ::std::sync::OnceLock<::fieldplan::TableDef> =
                    ::std::sync::OnceLock::new();
                DEF.get_or_init(|| {
                    ::fieldplan::TableDef::new(#table)
                        #schema
                        #(.column(#columns))*
                        .default_value(|| {
                            ::fieldplan::__private::serde_json::to_value(
                                <#name as ::core::default::Default>::default(),
                            )
                            .unwrap_or(::fieldplan::__private::serde_json::Value::Null)
                        })
                })
            }

            fn build_ref(builder: &mut ::fieldplan::RefBuilder) -> #ref_name {
                #ref_name {
                    __token: builder.own_token(),
                    #(#inits,)*
                }
            }
        }
    })
}

fn field_parts(field: &syn::Field, ident: &syn::Ident) -> Result<FieldParts> {
    let attr = FieldAttr::from_field(field)?;
    let field_name = ident.unraw().to_string();
    let column_name = attr.column.clone().unwrap_or_else(|| field_name.clone());

    let mut column = quote! { ::fieldplan::ColumnDef::new(#column_name, #field_name) };
    if attr.is_id {
        column = quote! { #column.primary_key() };
    }
    if attr.transient {
        column = quote! { #column.transient() };
    }
    for referenced_by in &attr.referenced_by {
        column = quote! { #column.referenced_by(#referenced_by) };
    }

    let Some(relation) = attr.relation() else {
        let value_ty = types::column_value_type(&field.ty);
        return Ok(FieldParts {
            decl: quote! { pub #ident: ::fieldplan::Field<#value_ty> },
            init: quote! { #ident: builder.field(#column_name) },
            column,
        });
    };

    let (target, many) = types::relation_target(&field.ty);
    let join_prefix = attr
        .join_prefix
        .clone()
        .unwrap_or_else(|| format!("{field_name}_"));

    // Both constructors take the related column first, then the local one.
    let (ctor, remote, local) = match relation {
        RelationAttr::BelongsTo {
            foreign_key,
            references,
        } => {
            if many {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "belongs_to fields hold a single related model, not a Vec",
                ));
            }
            (quote! { belongs_to }, references, foreign_key)
        }
        RelationAttr::HasMany { foreign_key, key } => {
            if !many {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "has_many fields must be a Vec of the related model",
                ));
            }
            (quote! { has_many }, foreign_key, key)
        }
    };

    Ok(FieldParts {
        decl: quote! { pub #ident: ::fieldplan::Rel<#target> },
        init: quote! { #ident: builder.relation(#column_name, &[(#remote, #local)]) },
        column: quote! {
            #column.relation(::fieldplan::Relation::#ctor(
                <#target as ::fieldplan::Model>::table_def,
                #join_prefix,
                #remote,
                #local,
            ))
        },
    })
}
