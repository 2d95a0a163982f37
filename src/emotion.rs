//! Emotion presets and inline marker extraction.
//!
//! A message may carry one marker such as `[✨ success]`. The glyph and the
//! name must agree with the table below; a mismatched pair is left in the
//! text untouched.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::resolver::VoiceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Excited,
    Celebration,
    Insight,
    Creative,
    Success,
    Progress,
    Investigating,
    Debugging,
    Learning,
    Pondering,
    Focused,
    Caution,
    Urgent,
}

/// A named prosody override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionPreset {
    pub name: &'static str,
    pub stability: f64,
    pub similarity_boost: f64,
}

impl EmotionPreset {
    pub fn settings(&self) -> VoiceSettings {
        VoiceSettings {
            stability: self.stability,
            similarity_boost: self.similarity_boost,
        }
    }
}

// (emotion, glyph, name, stability, similarity_boost)
static TABLE: [(Emotion, &str, &str, f64, f64); 13] = [
    (Emotion::Excited, "💥", "excited", 0.7, 0.9),
    (Emotion::Celebration, "🎉", "celebration", 0.65, 0.85),
    (Emotion::Insight, "💡", "insight", 0.55, 0.8),
    (Emotion::Creative, "🎨", "creative", 0.5, 0.75),
    (Emotion::Success, "✨", "success", 0.6, 0.8),
    (Emotion::Progress, "📈", "progress", 0.55, 0.75),
    (Emotion::Investigating, "🔍", "investigating", 0.6, 0.85),
    (Emotion::Debugging, "🐛", "debugging", 0.55, 0.8),
    (Emotion::Learning, "📚", "learning", 0.5, 0.75),
    (Emotion::Pondering, "🤔", "pondering", 0.65, 0.8),
    (Emotion::Focused, "🎯", "focused", 0.7, 0.85),
    (Emotion::Caution, "⚠️", "caution", 0.4, 0.6),
    (Emotion::Urgent, "🚨", "urgent", 0.3, 0.9),
];

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    let glyphs: Vec<String> = TABLE.iter().map(|(_, g, ..)| regex::escape(g)).collect();
    Regex::new(&format!(r"\[({})\s+(\w+)\]", glyphs.join("|"))).unwrap()
});

impl Emotion {
    #[cfg(test)]
    pub const ALL: [Emotion; 13] = [
        Emotion::Excited,
        Emotion::Celebration,
        Emotion::Insight,
        Emotion::Creative,
        Emotion::Success,
        Emotion::Progress,
        Emotion::Investigating,
        Emotion::Debugging,
        Emotion::Learning,
        Emotion::Pondering,
        Emotion::Focused,
        Emotion::Caution,
        Emotion::Urgent,
    ];

    fn row(self) -> &'static (Emotion, &'static str, &'static str, f64, f64) {
        // TABLE is declared in the same order as the enum.
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.row().2
    }

    pub fn glyph(self) -> &'static str {
        self.row().1
    }

    pub fn preset(self) -> EmotionPreset {
        let (_, _, name, stability, similarity_boost) = *self.row();
        EmotionPreset {
            name,
            stability,
            similarity_boost,
        }
    }

    pub fn from_name(name: &str) -> Option<Emotion> {
        TABLE
            .iter()
            .find(|(_, _, n, ..)| n.eq_ignore_ascii_case(name))
            .map(|(e, ..)| *e)
    }

    pub fn from_glyph(glyph: &str) -> Option<Emotion> {
        TABLE.iter().find(|(_, g, ..)| *g == glyph).map(|(e, ..)| *e)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of marker extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub cleaned: String,
    pub emotion: Option<Emotion>,
}

/// Pull the first `[<glyph> <name>]` marker out of already-sanitized text.
///
/// Only the first marker is considered. If its glyph and name disagree the
/// text is returned unchanged with no emotion.
pub fn extract_emotion(sanitized: &str) -> Extraction {
    let unchanged = || Extraction {
        cleaned: sanitized.to_string(),
        emotion: None,
    };

    let Some(caps) = MARKER.captures(sanitized) else {
        return unchanged();
    };

    let by_glyph = Emotion::from_glyph(&caps[1]);
    let by_name = Emotion::from_name(&caps[2]);
    match (by_glyph, by_name) {
        (Some(g), Some(n)) if g == n => {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let mut cleaned = String::with_capacity(sanitized.len());
            cleaned.push_str(&sanitized[..whole.start]);
            cleaned.push_str(&sanitized[whole.end..]);
            Extraction {
                cleaned: cleaned.trim().to_string(),
                emotion: Some(g),
            }
        }
        _ => unchanged(),
    }
}
