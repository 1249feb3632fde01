use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a property inside its class's property vector.
pub type PropertyId = u16;
/// Index of a schema inside its class's schema vector.
pub type SchemaId = u16;
/// Maximum number of items in a vector property.
pub type VecMaxLength = u16;
/// Maximum length of a text property.
pub type TextMaxLength = u16;
/// Monotonic counter attached to vector values.
pub type Nonce = u64;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The raw numeric value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of a class, allocated once when the class is created.
    ClassId,
    "class"
);
arena_id!(
    /// Identifier of an entity. Never reused after removal.
    EntityId,
    "entity"
);
arena_id!(
    /// Identifier of a curator group.
    CuratorGroupId,
    "group"
);
arena_id!(
    /// Identifier of a curator inside the working group.
    CuratorId,
    "curator"
);
arena_id!(
    /// Identifier of a registered member.
    MemberId,
    "member"
);

/// The id spaces handed out by the host's monotonic allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdKind {
    Class,
    Entity,
    CuratorGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert_eq!(ClassId(3).to_string(), "class:3");
        assert_eq!(EntityId(42).to_string(), "entity:42");
        assert_eq!(CuratorGroupId(1).to_string(), "group:1");
    }

    #[test]
    fn debug_names_the_type() {
        assert_eq!(format!("{:?}", EntityId(7)), "EntityId(7)");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&EntityId(9)).unwrap();
        assert_eq!(json, "9");
        let parsed: EntityId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, EntityId(9));
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(EntityId(1) < EntityId(2));
        assert_eq!(EntityId::from(5).get(), 5);
    }
}
