use crate::sequence::ModEntry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameFamily {
    TotalWar,
    Bannerlord,
}

impl Default for GameFamily {
    fn default() -> Self {
        GameFamily::TotalWar
    }
}

impl GameFamily {
    pub fn display_name(self) -> &'static str {
        match self {
            GameFamily::TotalWar => "Total War",
            GameFamily::Bannerlord => "Mount & Blade II: Bannerlord",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameFamily::TotalWar => "totalwar",
            GameFamily::Bannerlord => "bannerlord",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        supported_games()
            .into_iter()
            .find(|game| game.as_str().eq_ignore_ascii_case(value))
    }

    pub fn data_dir_name(self) -> &'static str {
        self.as_str()
    }

    /// Base order used before dependencies are resolved: pack file names the
    /// way the official launcher ranks them, or creation time.
    pub fn compare_base_order(self, a: &ModEntry, b: &ModEntry) -> Ordering {
        match self {
            GameFamily::TotalWar => compare_pack_priority(a.pack_file_name(), b.pack_file_name()),
            GameFamily::Bannerlord => a.created_at.cmp(&b.created_at),
        }
    }
}

pub fn supported_games() -> Vec<GameFamily> {
    vec![GameFamily::TotalWar, GameFamily::Bannerlord]
}

fn compare_pack_priority(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let folded = a
                .bytes()
                .map(|byte| byte.to_ascii_lowercase())
                .cmp(b.bytes().map(|byte| byte.to_ascii_lowercase()));
            folded.then_with(|| a.cmp(b))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_priority_is_case_insensitive_with_bang_first() {
        let a = ModEntry::new("a", "A").with_pack_file("data/Zeta.pack");
        let b = ModEntry::new("b", "B").with_pack_file("data/alpha.pack");
        let c = ModEntry::new("c", "C").with_pack_file("data/!!first.pack");
        let mut list = vec![&a, &b, &c];
        list.sort_by(|x, y| GameFamily::TotalWar.compare_base_order(x, y));
        let order: Vec<&str> = list.iter().map(|entry| entry.identifier.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn creation_time_orders_other_families() {
        let old = ModEntry::new("old", "Old").with_created_at(10);
        let new = ModEntry::new("new", "New").with_created_at(20);
        assert_eq!(
            GameFamily::Bannerlord.compare_base_order(&old, &new),
            Ordering::Less
        );
    }

    #[test]
    fn parse_accepts_known_names() {
        assert_eq!(GameFamily::parse("TotalWar"), Some(GameFamily::TotalWar));
        assert_eq!(GameFamily::parse("bannerlord"), Some(GameFamily::Bannerlord));
        assert_eq!(GameFamily::parse("skyrim"), None);
    }
}
