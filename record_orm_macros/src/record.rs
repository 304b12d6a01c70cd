use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr, Token};

pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // #[record(collection = "...")] on the struct; inference applies otherwise
    let collection = match extract_collection(input)? {
        Some(c) => quote! { ::core::option::Option::Some(#c) },
        None => quote! { ::core::option::Option::None },
    };

    let (id_field, id_key) = extract_id_field(input)?;

    Ok(quote! {
        impl #impl_generics record_orm::Record for #name #ty_generics #where_clause {
            const ID_FIELD: &'static str = #id_key;
            const COLLECTION: ::core::option::Option<&'static str> = #collection;

            fn type_name() -> &'static str {
                #type_name
            }

            fn storage_id(&self) -> ::core::option::Option<&record_orm::StorageId> {
                self.#id_field.get()
            }

            fn set_storage_id(&mut self, id: record_orm::StorageId) {
                self.#id_field.set(id);
            }
        }
    })
}

fn extract_collection(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut collection = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}

/// Returns the identity field and the key it serializes under.
fn extract_id_field(input: &DeriveInput) -> syn::Result<(Ident, String)> {
    let fields = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Record derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Record derive only supports structs",
            ))
        }
    };

    let mut marked = None;
    for field in fields {
        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    marked = field.ident.clone();
                    Ok(())
                } else {
                    Err(meta.error("expected `id`"))
                }
            })?;
        }
    }

    // Default: the field named `id`
    let id_field = match marked {
        Some(ident) => ident,
        None => fields
            .iter()
            .filter_map(|field| field.ident.as_ref())
            .find(|ident| *ident == "id")
            .cloned()
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    &input.ident,
                    "Record derive: no field marked with #[record(id)] and no field named `id`",
                )
            })?,
    };

    let field = fields
        .iter()
        .find(|field| field.ident.as_ref() == Some(&id_field))
        .ok_or_else(|| syn::Error::new_spanned(&id_field, "identity field not found"))?;

    let key = match serde_name(&field.attrs, "rename")? {
        Some(key) => key,
        None => {
            let raw = id_field.to_string();
            let raw = raw.trim_start_matches("r#");
            match serde_name(&input.attrs, "rename_all")? {
                Some(rule) => apply_rename_rule(&rule, raw)
                    .ok_or_else(|| syn::Error::new_spanned(&input.ident, unknown_rule(&rule)))?,
                None => raw.to_string(),
            }
        }
    };

    Ok((id_field, key))
}

fn unknown_rule(rule: &str) -> String {
    format!("unknown serde rename rule `{}`", rule)
}

/// Reads the serialize-side value of a serde `key = "..."` or
/// `key(serialize = "...")` attribute.
fn serde_name(attrs: &[Attribute], key: &str) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident(key) {
                return skip_value(&meta);
            }

            if meta.input.peek(Token![=]) {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                return Ok(());
            }

            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("serialize") {
                    let value: LitStr = inner.value()?.parse()?;
                    name = Some(value.value());
                    Ok(())
                } else {
                    skip_value(&inner)
                }
            })
        })?;
    }
    Ok(name)
}

/// Consumes the value of a serde meta item we do not interpret: `default`,
/// `skip_serializing_if = "..."`, `bound(serialize = "...")`.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream2 = content.parse()?;
    }
    Ok(())
}

/// Serde's `rename_all` rules as applied to a snake_case field name.
fn apply_rename_rule(rule: &str, field: &str) -> Option<String> {
    let renamed = match rule {
        "lowercase" | "snake_case" => field.to_string(),
        "UPPERCASE" | "SCREAMING_SNAKE_CASE" => field.to_ascii_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.to_ascii_uppercase().replace('_', "-"),
        "PascalCase" => pascal_case(field),
        "camelCase" => {
            let pascal = pascal_case(field);
            let mut chars = pascal.chars();
            match chars.next() {
                Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                None => pascal,
            }
        }
        _ => return None,
    };
    Some(renamed)
}

fn pascal_case(field: &str) -> String {
    let mut pascal = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            pascal.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            pascal.push(ch);
        }
    }
    pascal
}
