use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'. Expected one of: {expected}")]
pub struct OptionsError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hairstyle {
    #[serde(rename = "Buzz Cut")]
    BuzzCut,
    #[serde(rename = "Long Wavy")]
    LongWavy,
    #[serde(rename = "Pompadour")]
    Pompadour,
    #[serde(rename = "Bald")]
    Bald,
    #[serde(rename = "Dreadlocks")]
    Dreadlocks,
    #[serde(rename = "Mohawk")]
    Mohawk,
    #[serde(rename = "Afro")]
    Afro,
    #[serde(rename = "Undercut")]
    Undercut,
    #[serde(rename = "Quiff")]
    Quiff,
    #[serde(rename = "Side Part")]
    SidePart,
    #[serde(rename = "Man Bun")]
    ManBun,
    #[serde(rename = "Crew Cut")]
    CrewCut,
}

impl Hairstyle {
    pub const ALL: [Hairstyle; 12] = [
        Hairstyle::BuzzCut,
        Hairstyle::LongWavy,
        Hairstyle::Pompadour,
        Hairstyle::Bald,
        Hairstyle::Dreadlocks,
        Hairstyle::Mohawk,
        Hairstyle::Afro,
        Hairstyle::Undercut,
        Hairstyle::Quiff,
        Hairstyle::SidePart,
        Hairstyle::ManBun,
        Hairstyle::CrewCut,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Hairstyle::BuzzCut => "Buzz Cut",
            Hairstyle::LongWavy => "Long Wavy",
            Hairstyle::Pompadour => "Pompadour",
            Hairstyle::Bald => "Bald",
            Hairstyle::Dreadlocks => "Dreadlocks",
            Hairstyle::Mohawk => "Mohawk",
            Hairstyle::Afro => "Afro",
            Hairstyle::Undercut => "Undercut",
            Hairstyle::Quiff => "Quiff",
            Hairstyle::SidePart => "Side Part",
            Hairstyle::ManBun => "Man Bun",
            Hairstyle::CrewCut => "Crew Cut",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeardStyle {
    #[serde(rename = "Clean Shaven")]
    CleanShaven,
    #[serde(rename = "Full Beard")]
    FullBeard,
    #[serde(rename = "Goatee")]
    Goatee,
    #[serde(rename = "Stubble")]
    Stubble,
    #[serde(rename = "Gandalf Beard")]
    Gandalf,
    #[serde(rename = "Moustache")]
    Moustache,
    #[serde(rename = "Van Dyke")]
    VanDyke,
    #[serde(rename = "Anchor Beard")]
    Anchor,
    #[serde(rename = "Circle Beard")]
    CircleBeard,
}

impl BeardStyle {
    pub const ALL: [BeardStyle; 9] = [
        BeardStyle::CleanShaven,
        BeardStyle::FullBeard,
        BeardStyle::Goatee,
        BeardStyle::Stubble,
        BeardStyle::Gandalf,
        BeardStyle::Moustache,
        BeardStyle::VanDyke,
        BeardStyle::Anchor,
        BeardStyle::CircleBeard,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            BeardStyle::CleanShaven => "Clean Shaven",
            BeardStyle::FullBeard => "Full Beard",
            BeardStyle::Goatee => "Goatee",
            BeardStyle::Stubble => "Stubble",
            BeardStyle::Gandalf => "Gandalf Beard",
            BeardStyle::Moustache => "Moustache",
            BeardStyle::VanDyke => "Van Dyke",
            BeardStyle::Anchor => "Anchor Beard",
            BeardStyle::CircleBeard => "Circle Beard",
        }
    }
}

impl fmt::Display for Hairstyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for BeardStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercases and folds `-`/`_` into spaces so "side-part", "side_part"
/// and "Side Part" compare equal.
fn normalize_option_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| if ch == '-' || ch == '_' { ' ' } else { ch })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn parse_labelled<T: Copy>(
    kind: &'static str,
    value: &str,
    all: &[T],
    label: fn(T) -> &'static str,
) -> Result<T, OptionsError> {
    let wanted = normalize_option_name(value);
    all.iter()
        .copied()
        .find(|candidate| normalize_option_name(label(*candidate)) == wanted)
        .ok_or_else(|| OptionsError {
            kind,
            value: value.to_string(),
            expected: all
                .iter()
                .map(|candidate| label(*candidate))
                .collect::<Vec<_>>()
                .join(", "),
        })
}

impl FromStr for Hairstyle {
    type Err = OptionsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_labelled("hairstyle", value, &Hairstyle::ALL, Hairstyle::label)
    }
}

impl FromStr for BeardStyle {
    type Err = OptionsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_labelled("beard style", value, &BeardStyle::ALL, BeardStyle::label)
    }
}

pub const DEFAULT_COLOR: &str = "#3d2b1f";

/// The selector values in effect for the next generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylingOptions {
    pub hairstyle: Hairstyle,
    pub beard_style: BeardStyle,
    pub color: String,
}

impl StylingOptions {
    pub fn new(hairstyle: Hairstyle, beard_style: BeardStyle, color: impl Into<String>) -> Self {
        Self {
            hairstyle,
            beard_style,
            color: color.into(),
        }
    }
}

impl Default for StylingOptions {
    fn default() -> Self {
        Self::new(Hairstyle::Quiff, BeardStyle::Stubble, DEFAULT_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_and_slugs() {
        assert_eq!("Buzz Cut".parse::<Hairstyle>(), Ok(Hairstyle::BuzzCut));
        assert_eq!("side-part".parse::<Hairstyle>(), Ok(Hairstyle::SidePart));
        assert_eq!("MAN_BUN".parse::<Hairstyle>(), Ok(Hairstyle::ManBun));
        assert_eq!(
            "gandalf beard".parse::<BeardStyle>(),
            Ok(BeardStyle::Gandalf)
        );
    }

    #[test]
    fn rejects_unknown_option_with_expected_list() {
        let err = "mullet".parse::<Hairstyle>().unwrap_err();
        assert_eq!(err.kind, "hairstyle");
        assert!(err.expected.contains("Crew Cut"));
        assert!(err.to_string().contains("mullet"));
    }

    #[test]
    fn option_sets_have_expected_sizes() {
        assert_eq!(Hairstyle::ALL.len(), 12);
        assert_eq!(BeardStyle::ALL.len(), 9);
        for hairstyle in Hairstyle::ALL {
            assert_eq!(hairstyle.label().parse::<Hairstyle>(), Ok(hairstyle));
        }
        for beard in BeardStyle::ALL {
            assert_eq!(beard.label().parse::<BeardStyle>(), Ok(beard));
        }
    }

    #[test]
    fn serializes_with_labels_and_camel_case_keys() {
        let options = StylingOptions::new(Hairstyle::BuzzCut, BeardStyle::CleanShaven, "#000000");
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "hairstyle": "Buzz Cut",
                "beardStyle": "Clean Shaven",
                "color": "#000000"
            })
        );
    }

    #[test]
    fn color_is_not_validated() {
        let options: StylingOptions = serde_json::from_str(
            r#"{"hairstyle":"Afro","beardStyle":"Goatee","color":"sunset orange"}"#,
        )
        .unwrap();
        assert_eq!(options.color, "sunset orange");
    }

    #[test]
    fn defaults_match_session_start() {
        let options = StylingOptions::default();
        assert_eq!(options.hairstyle, Hairstyle::Quiff);
        assert_eq!(options.beard_style, BeardStyle::Stubble);
        assert_eq!(options.color, DEFAULT_COLOR);
    }
}
