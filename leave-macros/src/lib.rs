//! Procedural macros for leave-client
//!
//! This crate provides macros to reduce boilerplate in the leave-client models:
//!
//! - `#[derive(DbEnum)]` - Map a fieldless enum to its UPPER_SNAKE database label

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive the `DbEnum` and `ToSqlValue` contracts for a string-backed enum.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, DbEnum)]
/// pub enum LeaveStatus {
///     Pending,
///     Approved,
///     #[db_enum(rename = "CANCELED")]
///     Cancelled,
/// }
/// ```
///
/// # Generated Code
///
/// For the enum above:
///
/// ```ignore
/// impl crate::orm::DbEnum for LeaveStatus {
///     const VARIANTS: &'static [Self] = &[Self::Pending, Self::Approved, Self::Cancelled];
///     fn as_str(&self) -> &'static str {
///         match self {
///             Self::Pending => "PENDING",
///             Self::Approved => "APPROVED",
///             Self::Cancelled => "CANCELED",
///         }
///     }
///     fn from_db_str(value: &str) -> Option<Self> { /* reverse mapping */ }
/// }
///
/// impl crate::orm::ToSqlValue for LeaveStatus { /* SqlValue::String(label) */ }
/// impl std::fmt::Display for LeaveStatus { /* writes the label */ }
/// ```
///
/// The generated impls refer to `crate::orm`, so the derive is meant to be
/// used inside the leave-client crate itself.
#[proc_macro_derive(DbEnum, attributes(db_enum))]
pub fn derive_db_enum(input: TokenStream) -> TokenStream {
    let parsed = parse_macro_input!(input as DeriveInput);

    match expand_db_enum(&parsed) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_db_enum(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            enum_name,
            "DbEnum can only be derived for enums",
        ));
    };

    let mut idents = Vec::with_capacity(data.variants.len());
    let mut labels = Vec::with_capacity(data.variants.len());

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "DbEnum variants must not carry data",
            ));
        }

        let label = match rename_of(&variant.attrs)? {
            Some(label) => label,
            None => variant.ident.to_string().to_case(Case::UpperSnake),
        };

        if labels.contains(&label) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate database label `{}`", label),
            ));
        }

        idents.push(&variant.ident);
        labels.push(label);
    }

    Ok(quote! {
        impl crate::orm::DbEnum for #enum_name {
            const VARIANTS: &'static [Self] = &[#(Self::#idents),*];

            fn as_str(&self) -> &'static str {
                match self {
                    #(Self::#idents => #labels,)*
                }
            }

            fn from_db_str(value: &str) -> ::std::option::Option<Self> {
                match value {
                    #(#labels => ::std::option::Option::Some(Self::#idents),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl crate::orm::ToSqlValue for #enum_name {
            fn to_sql_value(&self) -> crate::orm::SqlValue {
                crate::orm::SqlValue::String(
                    crate::orm::DbEnum::as_str(self).to_string(),
                )
            }
        }

        impl ::std::fmt::Display for #enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(crate::orm::DbEnum::as_str(self))
            }
        }
    })
}

/// Read `#[db_enum(rename = "...")]` from a variant, if present.
fn rename_of(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("db_enum")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported db_enum attribute, expected `rename`"))
            }
        })?;
    }

    Ok(rename)
}
