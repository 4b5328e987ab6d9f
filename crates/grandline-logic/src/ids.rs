//! Typed identifiers for every persisted collection.
//!
//! The store hands out plain `u32` keys; wrapping them keeps a crew id from
//! ever being passed where a character id is expected. An unset reference is
//! modelled as `Option<Id>` rather than the `0` sentinel.

use serde::{Deserialize, Serialize};

macro_rules! entity_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            pub struct $name(pub u32);

            impl $name {
                /// Raw store key.
                pub fn raw(self) -> u32 {
                    self.0
                }
            }

            impl From<u32> for $name {
                fn from(raw: u32) -> Self {
                    Self(raw)
                }
            }

            impl From<$name> for u32 {
                fn from(id: $name) -> u32 {
                    id.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

entity_ids! {
    /// Key into the characters collection.
    CharacterId,
    /// Key into the crews collection.
    CrewId,
    /// Key into the ships collection.
    ShipId,
    /// Key into the islands collection.
    IslandId,
    /// Key into the territories collection.
    TerritoryId,
    /// Key into the tasks collection.
    TaskId,
    /// Key into the append-only battle history.
    BattleId,
    /// Key into the devil fruit catalogue.
    DevilFruitId,
    /// Key into the combat style profiles.
    StyleCombatId,
    /// Key shared by the derived rank tables.
    RankEntryId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_raw_value() {
        assert!(CrewId(3) < CrewId(10));
        assert_eq!(CharacterId::from(7).raw(), 7);
        assert_eq!(u32::from(IslandId(12)), 12);
        assert_eq!(TaskId(5).to_string(), "5");
    }
}
