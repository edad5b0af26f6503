//! Strongly-typed identifiers for fieldcheck
//!
//! Record ids are opaque strings chosen by whoever created the record.
//! Only session ids are minted here, at check-in.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
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
    };
}

record_id!(
    /// Identifier of a provider or administrator
    UserId
);

record_id!(
    /// Identifier of a school location
    SchoolId
);

record_id!(
    /// Identifier of a recurring schedule slot
    ScheduleId
);

record_id!(
    /// Identifier of a check-in session
    SessionId
);

impl SessionId {
    /// Mint a fresh random session id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_equality() {
        let a = UserId::new("prov-1");
        let b = UserId::from("prov-1");
        let c = UserId::new("prov-2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "prov-1");
    }

    #[test]
    fn generated_session_ids_are_unique() {
        let s1 = SessionId::generate();
        let s2 = SessionId::generate();
        assert_ne!(s1, s2);
        assert_eq!(s1.as_str().len(), 32);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = SchoolId::new("lincoln-elementary");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"lincoln-elementary\"");

        let parsed: SchoolId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
