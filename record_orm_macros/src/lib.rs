mod record;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Record)]
// ============================================================================

/// Derive macro for the `Record` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, Record)]
/// #[serde(default)]
/// struct Invoice {
///     id: StorageIdentity,
///     number: Option<u32>,
/// }
/// ```
///
/// With an explicit collection and a differently named identity field:
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, Record)]
/// #[record(collection = "buses")]
/// struct Bus {
///     #[record(id)]
///     #[serde(rename = "key")]
///     storage: StorageIdentity,
///     route: Option<String>,
/// }
/// ```
///
/// The identity field must be a `StorageIdentity`. It is the field marked
/// `#[record(id)]`, or the field named `id` when none is marked. Its serde
/// key becomes `Record::ID_FIELD`, honoring `#[serde(rename = "...")]` on the
/// field and `#[serde(rename_all = "...")]` on the struct.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
