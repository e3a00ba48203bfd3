//! Type helpers for peeling wrapper types.

/// Extract `T` from `Wrapper<T>` when the last path segment is `wrapper`.
///
/// Recognizes bare and qualified paths (`Option<T>`, `std::option::Option<T>`).
fn wrapper_inner<'a>(ty: &'a syn::Type, wrapper: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// The value type of a column field: `Option<T>` becomes `T`.
pub(super) fn column_value_type(ty: &syn::Type) -> &syn::Type {
    wrapper_inner(ty, "Option").unwrap_or(ty)
}

/// The related model type of a relation field.
///
/// `Option`, `Box` and `Vec` are peeled in any nesting. Returns the model
/// type and whether a `Vec` was among the wrappers.
pub(super) fn relation_target(ty: &syn::Type) -> (&syn::Type, bool) {
    let mut current = ty;
    let mut many = false;
    loop {
        if let Some(inner) = wrapper_inner(current, "Vec") {
            many = true;
            current = inner;
        } else if let Some(inner) =
            wrapper_inner(current, "Option").or_else(|| wrapper_inner(current, "Box"))
        {
            current = inner;
        } else {
            return (current, many);
        }
    }
}
