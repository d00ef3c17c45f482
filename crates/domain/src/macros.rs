//! Macro for string-backed enums
//!
//! Generates `as_str`, `Display`, and a case-insensitive `FromStr` from a
//! single variant-to-string table, so the stored form and the parsed form
//! cannot drift apart.
//!
//! # Example
//!
//! ```rust
//! use storeguard_domain::impl_str_enum;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Outcome {
//!     Success,
//!     Failure,
//! }
//!
//! impl_str_enum!(Outcome {
//!     Success => "success",
//!     Failure => "failure",
//! });
//!
//! assert_eq!(Outcome::Failure.as_str(), "failure");
//! assert_eq!("SUCCESS".parse::<Outcome>(), Ok(Outcome::Success));
//! ```

/// Implements `as_str`, `Display`, and `FromStr` for a fieldless enum.
///
/// Parsing ignores ASCII case; unknown values produce a message naming the
/// enum.
#[macro_export]
macro_rules! impl_str_enum {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical lowercase form used in storage and logs.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
