use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{CuratorGroupId, CuratorId, MemberId};

/// The party on whose behalf an operation is executed.
///
/// Authentication happens outside the directory; by the time an `Actor`
/// reaches the permission gate it is already trusted to be who it claims.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// The working group lead. Administers classes and curator groups.
    Lead,
    /// A curator acting as a member of a curator group.
    Curator(CuratorGroupId, CuratorId),
    /// An ordinary member.
    Member(MemberId),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Lead => write!(f, "lead"),
            Actor::Curator(group, curator) => write!(f, "curator:{}:{}", group.0, curator.0),
            Actor::Member(member) => write!(f, "member:{}", member.0),
        }
    }
}

/// Parses `lead`, `member:<id>` and `curator:<group>:<id>`.
impl FromStr for Actor {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let number = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| TypeError::InvalidActor(s.to_string()))
        };
        match parts.as_slice() {
            ["lead"] => Ok(Actor::Lead),
            ["member", id] => Ok(Actor::Member(MemberId(number(*id)?))),
            ["curator", group, id] => Ok(Actor::Curator(
                CuratorGroupId(number(*group)?),
                CuratorId(number(*id)?),
            )),
            _ => Err(TypeError::InvalidActor(s.to_string())),
        }
    }
}

/// Who owns an entity and may mutate it as its controller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityController {
    /// Every curator group that maintains the entity's class.
    #[default]
    Maintainers,
    /// A single member.
    Member(MemberId),
    /// The working group lead.
    Lead,
}

impl EntityController {
    /// The controller an entity receives when `actor` creates it.
    pub fn from_actor(actor: &Actor) -> Self {
        match actor {
            Actor::Lead => Self::Lead,
            Actor::Curator(..) => Self::Maintainers,
            Actor::Member(member_id) => Self::Member(*member_id),
        }
    }
}

impl fmt::Display for EntityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityController::Maintainers => write!(f, "maintainers"),
            EntityController::Member(member) => write!(f, "member:{}", member.0),
            EntityController::Lead => write!(f, "lead"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_from_actor() {
        assert_eq!(EntityController::from_actor(&Actor::Lead), EntityController::Lead);
        assert_eq!(
            EntityController::from_actor(&Actor::Curator(CuratorGroupId(1), CuratorId(2))),
            EntityController::Maintainers
        );
        assert_eq!(
            EntityController::from_actor(&Actor::Member(MemberId(5))),
            EntityController::Member(MemberId(5))
        );
    }

    #[test]
    fn actor_parse_roundtrip() {
        for actor in [
            Actor::Lead,
            Actor::Member(MemberId(12)),
            Actor::Curator(CuratorGroupId(3), CuratorId(4)),
        ] {
            let parsed: Actor = actor.to_string().parse().unwrap();
            assert_eq!(parsed, actor);
        }
    }

    #[test]
    fn actor_parse_rejects_garbage() {
        assert!("admin".parse::<Actor>().is_err());
        assert!("member:x".parse::<Actor>().is_err());
        assert!("curator:1".parse::<Actor>().is_err());
    }
}
