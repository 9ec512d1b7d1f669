//! Teams and competing sides

use serde::{Deserialize, Serialize};

/// One of the two competing sides of a team round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Yellow,
    Blue,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::Yellow => Side::Blue,
            Side::Blue => Side::Yellow,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Side::Yellow => "Yellow",
            Side::Blue => "Blue",
        }
    }
}

/// Team membership with display metadata and capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    Unassigned,
    Yellow,
    /// Yellow's high-value member; killing them is worth double
    YellowCaptain,
    Blue,
    BlueCaptain,
    /// Free-for-all combatant in a duel round
    Duelist,
    Spectator,
    Operator,
}

impl Team {
    pub fn display_name(&self) -> &'static str {
        match self {
            Team::Unassigned => "Unassigned",
            Team::Yellow => "Yellow",
            Team::YellowCaptain => "Yellow Captain",
            Team::Blue => "Blue",
            Team::BlueCaptain => "Blue Captain",
            Team::Duelist => "Duelist",
            Team::Spectator => "Spectator",
            Team::Operator => "Operator",
        }
    }

    /// Legacy formatting code used by clients for the name tag
    pub fn color_code(&self) -> &'static str {
        match self {
            Team::Yellow | Team::YellowCaptain => "§e",
            Team::Blue | Team::BlueCaptain => "§9",
            Team::Duelist => "§c",
            Team::Spectator => "§7",
            Team::Operator => "§5",
            Team::Unassigned => "§f",
        }
    }

    /// Takes part in rounds
    pub fn is_playing(&self) -> bool {
        matches!(
            self,
            Team::Yellow | Team::YellowCaptain | Team::Blue | Team::BlueCaptain | Team::Duelist
        )
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Team::Operator)
    }

    pub fn is_spectator(&self) -> bool {
        matches!(self, Team::Spectator)
    }

    /// Kill credit for this team's deaths is doubled
    pub fn is_high_value(&self) -> bool {
        matches!(self, Team::YellowCaptain | Team::BlueCaptain)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Team::Yellow | Team::YellowCaptain => Some(Side::Yellow),
            Team::Blue | Team::BlueCaptain => Some(Side::Blue),
            _ => None,
        }
    }

    /// Same competing side (duelists are never allies)
    pub fn is_ally_of(&self, other: &Team) -> bool {
        match (self.side(), other.side()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captains_are_high_value_members_of_their_side() {
        assert!(Team::YellowCaptain.is_high_value());
        assert!(!Team::Yellow.is_high_value());
        assert_eq!(Team::BlueCaptain.side(), Some(Side::Blue));
        assert!(Team::BlueCaptain.is_playing());
    }

    #[test]
    fn capability_flags_are_exclusive() {
        for team in [Team::Spectator, Team::Operator, Team::Unassigned] {
            assert!(!team.is_playing());
            assert_eq!(team.side(), None);
        }
        assert!(Team::Operator.is_operator());
        assert!(Team::Spectator.is_spectator());
        assert!(!Team::Duelist.is_operator());
    }

    #[test]
    fn alliances_follow_sides() {
        assert!(Team::Yellow.is_ally_of(&Team::YellowCaptain));
        assert!(!Team::Yellow.is_ally_of(&Team::Blue));
        assert!(!Team::Duelist.is_ally_of(&Team::Duelist));
        assert_eq!(Side::Yellow.opponent(), Side::Blue);
    }
}
