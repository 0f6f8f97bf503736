// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`string_id!`] — string-newtype identifier with the standard conversions
//! - [`simple_display!`] — `Display` impl mapping enum variants to string literals
//! - [`builder!`] — fluent test builder over a flat field list

/// Define a string-newtype identifier.
///
/// Generates `new()`, `as_str()`, `is_empty()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`.
///
/// ```ignore
/// crate::string_id! {
///     /// Doc comment for the ID type.
///     pub struct RunId;
/// }
/// ```
#[macro_export]
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new id from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the string value of this id.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the id is an empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generate a `Display` impl that maps enum variants to string literals.
///
/// Unit variants match directly; data-carrying variants use `(..)` to ignore fields.
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                })
            }
        }
    };
}

/// Generate a fluent test builder for a domain struct.
///
/// Takes a flat list of `<kind> field: Type = default` rows; `kind`
/// picks how the field is stored and set:
///
/// - `into` — setter takes `impl Into<Type>`, default is converted
/// - `set` — setter takes `Type` directly
/// - `opt` — stored as `Option<Type>`, setter wraps in `Some`
///
/// Every generated item is gated behind
/// `#[cfg(any(test, feature = "test-support"))]`.
///
/// ```ignore
/// crate::builder! {
///     pub struct FooBuilder => Foo {
///         into name: String = "test",
///         set count: u32 = 0,
///         opt label: String = None,
///     }
/// }
/// ```
#[macro_export]
macro_rules! builder {
    // Per-field storage type.
    (@store into $ty:ty) => { $ty };
    (@store set $ty:ty) => { $ty };
    (@store opt $ty:ty) => { Option<$ty> };

    // Per-field default value.
    (@init into $default:expr) => { $default.into() };
    (@init set $default:expr) => { $default };
    (@init opt $default:expr) => { $default };

    // Per-field setter method.
    (@setter into $field:ident : $ty:ty) => {
        pub fn $field(mut self, v: impl Into<$ty>) -> Self {
            self.$field = v.into();
            self
        }
    };
    (@setter set $field:ident : $ty:ty) => {
        pub fn $field(mut self, v: $ty) -> Self {
            self.$field = v;
            self
        }
    };
    (@setter opt $field:ident : $ty:ty) => {
        pub fn $field(mut self, v: impl Into<$ty>) -> Self {
            self.$field = Some(v.into());
            self
        }
    };

    (
        pub struct $builder:ident => $target:ident {
            $( $kind:tt $field:ident : $ty:ty = $default:expr ),+ $(,)?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $( $field: $crate::builder!(@store $kind $ty), )+
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $( $field: $crate::builder!(@init $kind $default), )+
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $( $crate::builder!(@setter $kind $field: $ty); )+

            pub fn build(self) -> $target {
                $target {
                    $( $field: self.$field, )+
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Create a builder with test defaults.
            pub fn builder() -> $builder {
                $builder::default()
            }
        }
    };
}
