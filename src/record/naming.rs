//! Collection-name inference.

use std::borrow::Cow;

use super::Record;

/// Lower-cases a type name and pluralizes it with a trailing `s`, unless it
/// already ends in `s`.
///
/// There is no irregular-plural table: `Bus` becomes `bus`. Types that need
/// a different name set `Record::COLLECTION`.
pub fn infer_collection_name(type_name: &str) -> String {
    let mut name = type_name.to_lowercase();
    if !name.ends_with('s') {
        name.push('s');
    }
    name
}

/// The collection a record type is stored in.
pub fn collection_name<R: Record>() -> Cow<'static, str> {
    match R::COLLECTION {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(infer_collection_name(R::type_name())),
    }
}
