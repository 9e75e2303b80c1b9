//! Helper macro for declaring port error enums.
//!
//! Every variant is a struct variant. For each one the macro emits:
//!
//! - a snake-case constructor whose arguments accept anything convertible
//!   into the declared field types, so adapters write
//!   `StoreError::query("...")`;
//! - an `is_<variant>` predicate for callers and tests that branch on the
//!   failure class without destructuring;
//! - an arm of `kind()`, the variant's stable snake-case name used as a
//!   structured log field.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),+ $(,)? } => $message:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field: $ty),+ },
            )+
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = "Build a `" $variant "` error."]
                    pub fn [<$variant:snake>]($($field: impl Into<$ty>),+) -> Self {
                        Self::$variant { $($field: $field.into()),+ }
                    }

                    #[doc = "Returns true for `" $variant "` errors."]
                    pub const fn [<is_ $variant:snake>](&self) -> bool {
                        matches!(self, Self::$variant { .. })
                    }
                )+

                /// Stable snake-case name of the variant.
                pub const fn kind(&self) -> &'static str {
                    match self {
                        $(Self::$variant { .. } => stringify!([<$variant:snake>]),)+
                    }
                }
            }
        }
    };
}

pub(crate) use define_port_error;
