//! Typed identifiers used across the workspace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifies a guard in the external user directory.
    GuardId
);
id_type!(
    /// Identifies a patrol location (geofence center).
    LocationId
);
id_type!(
    /// Identifies a scheduled shift row.
    ShiftId
);
id_type!(
    /// Identifies an appended attendance event.
    EventId
);
id_type!(
    /// Identifies a panic alert.
    AlertId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(GuardId::new(), GuardId::new());
    }

    #[test]
    fn id_serializes_as_plain_uuid() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
