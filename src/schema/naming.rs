use super::decl::{Directive, FieldDecl};

/// Converts an identifier to snake_case.
///
/// An underscore is inserted before every uppercase run that does not start
/// the identifier, then the whole result is lowercased:
/// `PhoneNumber` becomes `phone_number`, `UserID` becomes `user_id` and
/// `HTTPServer` becomes `httpserver`.
///
/// An uppercase run directly after `_` gets no second underscore, so
/// `Snake_Case` stays `snake_case`. Acronyms are kept as one word rather
/// than split after their first letter (`h_ttpserver`).
pub fn to_snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev: Option<char> = None;
    for c in ident.chars() {
        if c.is_ascii_uppercase() {
            let starts_run = prev.is_some_and(|p| !p.is_ascii_uppercase() && p != '_');
            if starts_run {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }
    out
}

/// Resolves the output key of a field.
///
/// A non-blank rename is used literally. Otherwise the identifier is
/// converted to snake_case, or just lowercased when the convention is off.
pub fn query_key(field: &FieldDecl, snake_case: bool) -> String {
    let renamed = field.directives.iter().find_map(|directive| match directive {
        Directive::Rename(key) if !key.trim().is_empty() => Some(key.as_str()),
        _ => None,
    });

    match renamed {
        Some(key) => key.to_owned(),
        None if snake_case => to_snake_case(field.name),
        None => field.name.to_lowercase(),
    }
}
