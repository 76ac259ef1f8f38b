//! Display formatting for numbers, durations and fight labels.

use std::sync::OnceLock;

use regex::Regex;

/// Compact magnitude label: `399999 -> "400k"`, `1250000 -> "1.25m"`.
pub fn format_compact_number(value: f64) -> String {
    if !value.is_finite() {
        return "--".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        let formatted = format!("{:.2}", abs / 1_000_000.0);
        let trimmed = if formatted.contains('.') {
            formatted.trim_end_matches('0').trim_end_matches('.')
        } else {
            formatted.as_str()
        };
        return format!("{sign}{trimmed}m");
    }
    if abs >= 10_000.0 {
        return format!("{sign}{:.0}k", abs / 1000.0);
    }
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// `m:ss`, or `h:mm:ss` past the hour. Zero and non-finite give `--:--`.
pub fn format_duration_ms(duration_ms: f64) -> String {
    if duration_ms == 0.0 || !duration_ms.is_finite() {
        return "--:--".to_string();
    }
    let total_seconds = (duration_ms / 1000.0).round().max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn clock_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").unwrap())
}

fn unit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(\d+(?:\.\d+)?)\s*h(?:ours?)?)?\s*(?:(\d+(?:\.\d+)?)\s*m(?:in(?:ute)?s?)?)?\s*(?:(\d+(?:\.\d+)?)\s*s(?:ec(?:ond)?s?)?)?\s*(?:(\d+(?:\.\d+)?)\s*ms)?$",
        )
        .unwrap()
    })
}

/// Normalize a free-text duration label. Clock-style labels are kept as
/// written; `"1m 30s"`-style and bare millisecond numbers are reformatted.
pub fn duration_label(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "--:--".to_string();
    }
    if clock_pattern().is_match(trimmed) {
        return trimmed.to_string();
    }
    if let Ok(ms) = trimmed.parse::<f64>() {
        return format_duration_ms(ms);
    }
    if let Some(caps) = unit_pattern().captures(trimmed) {
        let part = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let total = (part(1) * 3600.0 + part(2) * 60.0 + part(3)) * 1000.0 + part(4);
        if total > 0.0 {
            return format_duration_ms(total);
        }
    }
    trimmed.to_string()
}

fn wvw_prefix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:Detailed\s*WvW\s*-\s*|World\s*vs\s*World\s*-\s*|WvW\s*-\s*)").unwrap()
    })
}

/// Strip uploader prefixes such as `"Detailed WvW - "`.
pub fn sanitize_wvw_label(raw: &str) -> String {
    let mut label = raw.trim().to_string();
    // prefixes can stack ("Detailed WvW - WvW - ...")
    loop {
        let stripped = wvw_prefix_pattern().replace(&label, "").trim().to_string();
        if stripped == label {
            return label;
        }
        label = stripped;
    }
}

fn borderlands_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(Red|Blue|Green)\s+(?:Alpine|Desert)?\s*Borderlands$").unwrap()
    })
}

/// Map label shared by every fight-level view.
pub fn normalize_map_name(raw: Option<&str>) -> String {
    let cleaned = sanitize_wvw_label(raw.unwrap_or_default());
    if cleaned.is_empty() {
        return crate::models::UNKNOWN.to_string();
    }
    if let Some(caps) = borderlands_pattern().captures(&cleaned) {
        let colour = &caps[1];
        let mut chars = colour.chars();
        let titled: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        return format!("{titled} Borderlands");
    }
    cleaned
}

/// Chart colour for a map label.
pub fn map_color(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.contains("eternal") || lower == "ebg" {
        "#ffffff"
    } else if lower.contains("red") {
        "#ef4444"
    } else if lower.contains("blue") {
        "#3b82f6"
    } else if lower.contains("green") {
        "#22c55e"
    } else {
        crate::professions::NEUTRAL_COLOR
    }
}

fn label_tokens(label: &str) -> Vec<String> {
    label
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.len() > 3 && t.ends_with('s') {
                t[..t.len() - 1].to_string()
            } else {
                t.to_string()
            }
        })
        .collect()
}

/// Combine a fight name and map name unless one already covers the other.
pub fn build_fight_label(fight_name: &str, map_name: &str) -> String {
    let fight = sanitize_wvw_label(fight_name);
    let map = sanitize_wvw_label(map_name);
    if map.is_empty() {
        return fight;
    }
    if fight.is_empty() {
        return map;
    }
    let fight_tokens = label_tokens(&fight);
    let map_tokens = label_tokens(&map);
    let covers = |outer: &[String], inner: &[String]| {
        !inner.is_empty() && inner.iter().all(|t| outer.contains(t))
    };
    if covers(&fight_tokens, &map_tokens) || covers(&map_tokens, &fight_tokens) {
        fight
    } else {
        format!("{fight} - {map}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_number() {
        assert_eq!(format_compact_number(399999.0), "400k");
        assert_eq!(format_compact_number(374302.0), "374k");
        assert_eq!(format_compact_number(1_250_000.0), "1.25m");
        assert_eq!(format_compact_number(2_000_000.0), "2m");
        assert_eq!(format_compact_number(-15000.0), "-15k");
        assert_eq!(format_compact_number(9999.0), "9999");
        assert_eq!(format_compact_number(f64::NAN), "--");
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(format_duration_ms(0.0), "--:--");
        assert_eq!(format_duration_ms(90_000.0), "1:30");
        assert_eq!(format_duration_ms(3_725_000.0), "1:02:05");
        assert_eq!(format_duration_ms(f64::INFINITY), "--:--");
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label("01:30"), "01:30");
        assert_eq!(duration_label("2m 5s"), "2:05");
        assert_eq!(duration_label("45000"), "0:45");
        assert_eq!(duration_label("a while"), "a while");
    }

    #[test]
    fn test_map_names() {
        assert_eq!(normalize_map_name(Some("Detailed WvW - Eternal Battlegrounds")), "Eternal Battlegrounds");
        assert_eq!(normalize_map_name(Some("WvW - green alpine borderlands")), "Green Borderlands");
        assert_eq!(normalize_map_name(Some("Red Desert Borderlands")), "Red Borderlands");
        assert_eq!(normalize_map_name(None), "Unknown");
        assert_eq!(map_color("Blue Borderlands"), "#3b82f6");
        assert_eq!(map_color("Eternal Battlegrounds"), "#ffffff");
    }

    #[test]
    fn test_fight_label_merging() {
        assert_eq!(
            build_fight_label("Detailed WvW - Red Alpine Borderlands", "Red Borderlands"),
            "Red Alpine Borderlands"
        );
        assert_eq!(
            build_fight_label("Stonemist Castle", "Eternal Battlegrounds"),
            "Stonemist Castle - Eternal Battlegrounds"
        );
        assert_eq!(build_fight_label("", "Eternal Battlegrounds"), "Eternal Battlegrounds");
    }
}
