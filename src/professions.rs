//! Profession names, colours and label resolution.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::UNKNOWN;

/// Fallback colour for unknown professions and neutral chart slices.
pub const NEUTRAL_COLOR: &str = "#64748b";

/// `(name, colour)`, core professions followed by their elite specializations.
const PROFESSIONS: &[(&str, &str)] = &[
    ("Guardian", "#72C1D9"),
    ("Dragonhunter", "#72C1D9"),
    ("Firebrand", "#72C1D9"),
    ("Willbender", "#72C1D9"),
    ("Luminary", "#72C1D9"),
    ("Revenant", "#D16E5A"),
    ("Herald", "#D16E5A"),
    ("Renegade", "#D16E5A"),
    ("Vindicator", "#D16E5A"),
    ("Conduit", "#D16E5A"),
    ("Warrior", "#FFD166"),
    ("Berserker", "#FFD166"),
    ("Spellbreaker", "#FFD166"),
    ("Bladesworn", "#FFD166"),
    ("Paragon", "#FFD166"),
    ("Engineer", "#D09C59"),
    ("Scrapper", "#D09C59"),
    ("Holosmith", "#D09C59"),
    ("Mechanist", "#D09C59"),
    ("Amalgam", "#D09C59"),
    ("Ranger", "#8CDC82"),
    ("Druid", "#8CDC82"),
    ("Soulbeast", "#8CDC82"),
    ("Untamed", "#8CDC82"),
    ("Galeshot", "#8CDC82"),
    ("Thief", "#C08F95"),
    ("Daredevil", "#C08F95"),
    ("Deadeye", "#C08F95"),
    ("Specter", "#C08F95"),
    ("Antiquary", "#C08F95"),
    ("Elementalist", "#F68A87"),
    ("Tempest", "#F68A87"),
    ("Weaver", "#F68A87"),
    ("Catalyst", "#F68A87"),
    ("Evoker", "#F68A87"),
    ("Mesmer", "#B679D5"),
    ("Chronomancer", "#B679D5"),
    ("Mirage", "#B679D5"),
    ("Virtuoso", "#B679D5"),
    ("Troubadour", "#B679D5"),
    ("Necromancer", "#52A76F"),
    ("Reaper", "#52A76F"),
    ("Scourge", "#52A76F"),
    ("Harbinger", "#52A76F"),
    ("Ritualist", "#52A76F"),
];

pub fn is_known(name: &str) -> bool {
    PROFESSIONS.iter().any(|(n, _)| *n == name)
}

pub fn profession_color(name: &str) -> &'static str {
    PROFESSIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, color)| *color)
        .unwrap_or(NEUTRAL_COLOR)
}

/// Known names, longest first, so "Dragonhunter" wins over "Guardian".
fn known_by_length() -> &'static [&'static str] {
    static SORTED: OnceLock<Vec<&'static str>> = OnceLock::new();
    SORTED.get_or_init(|| {
        let mut names: Vec<&'static str> = PROFESSIONS.iter().map(|(n, _)| *n).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()));
        names
    })
}

fn label_suffixes() -> &'static [Regex; 3] {
    static SUFFIXES: OnceLock<[Regex; 3]> = OnceLock::new();
    SUFFIXES.get_or_init(|| {
        [
            Regex::new(r"\s*\([^)]*\)\s*$").unwrap(),
            Regex::new(r"\s*\[[^\]]*\]\s*$").unwrap(),
            Regex::new(r"\s\d+$").unwrap(),
        ]
    })
}

/// Map a raw profession or enemy label (e.g. `"Firebrand (pl-1234)"`,
/// `"Necromancer 3"`) to a known profession name.
pub fn resolve_profession_label(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return UNKNOWN.to_string();
    };
    let mut cleaned = raw.to_string();
    for pattern in label_suffixes() {
        cleaned = pattern.replace(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return UNKNOWN.to_string();
    }
    if is_known(cleaned) {
        return cleaned.to_string();
    }
    let lower = cleaned.to_lowercase();
    known_by_length()
        .iter()
        .find(|name| lower.contains(&name.to_lowercase()))
        .map(|name| name.to_string())
        .unwrap_or_else(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_and_decorated() {
        assert_eq!(resolve_profession_label(Some("Firebrand")), "Firebrand");
        assert_eq!(resolve_profession_label(Some("Scourge (pl-1234)")), "Scourge");
        assert_eq!(resolve_profession_label(Some("Necromancer 3")), "Necromancer");
        assert_eq!(resolve_profession_label(Some("Tempest [enemy]")), "Tempest");
    }

    #[test]
    fn test_resolve_longest_contained_name() {
        assert_eq!(resolve_profession_label(Some("enemy dragonhunter")), "Dragonhunter");
        assert_eq!(resolve_profession_label(Some("Siege Turtle")), "Siege Turtle");
        assert_eq!(resolve_profession_label(None), "Unknown");
        assert_eq!(resolve_profession_label(Some("  ")), "Unknown");
    }

    #[test]
    fn test_colors() {
        assert_eq!(profession_color("Reaper"), "#52A76F");
        assert_eq!(profession_color("Luminary"), profession_color("Guardian"));
        assert_eq!(profession_color("Nobody"), NEUTRAL_COLOR);
        assert!(is_known("Galeshot"));
    }
}
