//! Macro for implementing Display and FromStr for domain enums
//!
//! Session states, link qualities and failure kinds all travel through logs
//! and configuration files as lowercase strings. This macro keeps their
//! textual form in one place.
//!
//! # Example
//!
//! ```rust
//! use tidelink_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Http,
//!     Duplex,
//! }
//!
//! impl_domain_enum_conversions!(Channel {
//!     Http => "http",
//!     Duplex => "duplex",
//! });
//!
//! assert_eq!(Channel::Duplex.to_string(), "duplex");
//! assert_eq!("HTTP".parse::<Channel>().unwrap(), Channel::Http);
//! ```

/// Implements Display and FromStr traits for domain enums
///
/// This macro generates:
/// - Display trait: writes the mapped lowercase string
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// The mapped strings must be lowercase for parsing to round-trip.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Draining,
    }

    impl_domain_enum_conversions!(Phase {
        Idle => "idle",
        Draining => "draining",
    });

    #[test]
    fn display_uses_mapped_string() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Draining.to_string(), "draining");
    }

    #[test]
    fn parsing_ignores_case() {
        assert_eq!(Phase::from_str("DRAINING").unwrap(), Phase::Draining);
        assert_eq!(Phase::from_str("Idle").unwrap(), Phase::Idle);
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = Phase::from_str("paused").unwrap_err();
        assert!(err.contains("Invalid Phase: paused"));
        assert!(Phase::from_str("").is_err());
    }
}
