//! Declarative helpers for model definitions

/// Declare a model's scalar field enum together with its column table.
///
/// The enum variants and the column definitions share one ordering, so
/// `field as usize` indexes the column table.
///
/// ```ignore
/// model_fields! {
///     /// Scalar columns of [`Company`]
///     CompanyField => COMPANY_COLUMNS {
///         Id => ColumnDef::new("id", FieldKind::Text).primary_key(),
///         Name => ColumnDef::new("name", FieldKind::Text),
///     }
/// }
/// ```
macro_rules! model_fields {
    (
        $(#[$meta:meta])*
        $field:ident => $columns:ident {
            $($variant:ident => $def:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $field {
            $($variant),+
        }

        pub(crate) const $columns: &[$crate::orm::ColumnDef] = &[$($def),+];

        impl $crate::orm::ScalarField for $field {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn column(self) -> &'static str {
                $columns[self as usize].name
            }

            fn kind(self) -> $crate::orm::FieldKind {
                $columns[self as usize].kind
            }

            fn nullable(self) -> bool {
                $columns[self as usize].nullable
            }
        }
    };
}
