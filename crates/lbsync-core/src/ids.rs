//! Remote identifier types for lbsync.
//!
//! Every identifier is assigned by the cloud provider and treated as opaque.
//! The newtypes exist so a port ID can never be passed where a subnet ID is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty input.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if the string is empty or only whitespace.
            pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
                let s = s.into();
                if s.trim().is_empty() {
                    return Err(IdError::Empty(stringify!($name)));
                }
                Ok(Self(s))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        /// Wraps the value without checking it.
        ///
        /// For IDs known to be valid, such as literals and values already
        /// returned by the provider. Use `parse` for anything read from
        /// outside.
        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

remote_id!(
    /// Identifier of a load balancer, assigned by the load-balancing service.
    LoadBalancerId
);

remote_id!(
    /// Identifier of a network subnet.
    SubnetId
);

remote_id!(
    /// Identifier of a network port, such as a load balancer's virtual-IP port.
    PortId
);

remote_id!(
    /// Identifier of a security group.
    SecurityGroupId
);

remote_id!(
    /// Identifier of a load balancer flavor.
    FlavorId
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(
            LoadBalancerId::parse(""),
            Err(IdError::Empty("LoadBalancerId"))
        );
        assert!(PortId::parse("   ").is_err());
    }

    #[test]
    fn from_str_ref_does_not_check() {
        assert_eq!(PortId::from("").as_str(), "");
        assert!(PortId::parse("").is_err());
        assert!(serde_json::from_str::<PortId>("\"\"").is_err());
    }

    #[test]
    fn display_and_debug() {
        let id = SubnetId::from("subnet-1");
        assert_eq!(id.to_string(), "subnet-1");
        assert_eq!(format!("{id:?}"), "SubnetId(subnet-1)");
    }

    #[test]
    fn from_str_matches_parse() {
        let id: SecurityGroupId = "sg-1".parse().unwrap();
        assert_eq!(id, SecurityGroupId::parse("sg-1").unwrap());
    }

    #[test]
    fn serde_json_is_a_plain_string() {
        let id = PortId::from("port-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"port-1\"");
        let parsed: PortId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serde_json_rejects_empty() {
        let result: Result<FlavorId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
