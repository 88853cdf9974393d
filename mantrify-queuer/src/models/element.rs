//! Script elements
//!
//! An element is one ordered segment of a meditation script: spoken text, a
//! silence, or a pre-recorded sound clip. Elements are only constructed by the
//! normalizer, so every `Element` in the system has already been validated.

use serde::Serialize;

/// Numeric field that keeps the caller's original text alongside its parsed value
///
/// The raw form is what gets written back into generated files, so `"1.0"`
/// stays `"1.0"` instead of becoming `"1"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Numeric {
    pub raw: String,
    pub value: f64,
}

impl Numeric {
    /// Parse a trimmed textual number; `None` when it is not a finite number
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let value: f64 = trimmed.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Self {
            raw: trimmed.to_string(),
            value,
        })
    }
}

/// What an element contributes to the final audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Text to be synthesized by the TTS engine
    Speech,
    /// Silence of `pause_duration` seconds
    Pause,
    /// Reference to a catalogued sound clip
    SoundClip,
}

/// One validated script element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    /// Caller-supplied identifier (not required to be unique)
    pub id: String,
    pub text: Option<String>,
    pub voice_id: Option<String>,
    pub speed: Option<Numeric>,
    pub pause_duration: Option<Numeric>,
    pub sound_file: Option<String>,
}

impl Element {
    /// Classify the element
    ///
    /// Text wins over pause: a speech element may also carry a trailing pause,
    /// which is forwarded to the concatenation engine.
    pub fn kind(&self) -> ElementKind {
        if self.sound_file.is_some() {
            ElementKind::SoundClip
        } else if self.text.is_some() {
            ElementKind::Speech
        } else {
            ElementKind::Pause
        }
    }

    pub fn is_speech(&self) -> bool {
        self.kind() == ElementKind::Speech
    }

    /// Speech element with the given text
    pub fn speech(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            voice_id: None,
            speed: None,
            pause_duration: None,
            sound_file: None,
        }
    }

    /// Pause element; `seconds` must be a valid number
    pub fn pause(id: impl Into<String>, seconds: &str) -> Option<Self> {
        Some(Self {
            id: id.into(),
            text: None,
            voice_id: None,
            speed: None,
            pause_duration: Some(Numeric::parse(seconds)?),
            sound_file: None,
        })
    }

    /// Sound clip element referencing a catalog filename
    pub fn sound_clip(id: impl Into<String>, sound_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            voice_id: None,
            speed: None,
            pause_duration: None,
            sound_file: Some(sound_file.into()),
        }
    }
}

/// Ordered subsequence of speech elements, paired with their position in the script
pub fn speech_elements(elements: &[Element]) -> Vec<(usize, &Element)> {
    elements
        .iter()
        .enumerate()
        .filter(|(_, element)| element.is_speech())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_keeps_raw_text() {
        let speed = Numeric::parse(" 1.0 ").unwrap();
        assert_eq!(speed.raw, "1.0");
        assert_eq!(speed.value, 1.0);
    }

    #[test]
    fn test_numeric_rejects_garbage_and_non_finite() {
        assert!(Numeric::parse("fast").is_none());
        assert!(Numeric::parse("").is_none());
        assert!(Numeric::parse("NaN").is_none());
        assert!(Numeric::parse("inf").is_none());
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(Element::speech("1", "Breathe in").kind(), ElementKind::Speech);
        assert_eq!(Element::pause("2", "2.0").unwrap().kind(), ElementKind::Pause);
        assert_eq!(
            Element::sound_clip("3", "bell.mp3").kind(),
            ElementKind::SoundClip
        );
    }

    #[test]
    fn test_speech_with_pause_is_speech() {
        let mut element = Element::speech("1", "Relax");
        element.pause_duration = Numeric::parse("1.5");
        assert_eq!(element.kind(), ElementKind::Speech);
    }

    #[test]
    fn test_speech_elements_preserves_count_and_order() {
        let elements = vec![
            Element::speech("a", "first"),
            Element::pause("b", "1").unwrap(),
            Element::sound_clip("c", "gong.mp3"),
            Element::speech("d", "second"),
            Element::speech("e", "third"),
        ];

        let speech = speech_elements(&elements);

        let positions: Vec<usize> = speech.iter().map(|(i, _)| *i).collect();
        let ids: Vec<&str> = speech.iter().map(|(_, e)| e.id.as_str()).collect();
        assert_eq!(positions, vec![0, 3, 4]);
        assert_eq!(ids, vec!["a", "d", "e"]);
    }
}
