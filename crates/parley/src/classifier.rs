//! Decides, per user turn, which handling path applies. This is a fixed,
//! ordered rule table over the turn text and asset presence, not a learned
//! classifier: the first matching rule wins, and anything unmatched falls
//! through to the plain completion stream.
use lazy_static::lazy_static;
use regex::Regex;

/// Recognized image-edit operations. Edit phrasing that matches none of the
/// known kinds is acknowledged as unsupported rather than silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    RemoveBackground,
    Unsupported,
}

/// The handling path for one user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnIntent {
    EditImage(EditKind),
    GenerateImage { prompt: String },
    Canned { answer: String },
    Complete,
}

pub const BUILDER_ANSWER: &str = "I'm Parley, an open source chat assistant. \
I was put together by the Parley contributors; the code is on GitHub if you \
want to look under the hood.";

/// A rule maps (turn text, asset attached) to a path, or passes.
type Rule = fn(&str, bool) -> Option<TurnIntent>;

/// Evaluation order is the priority order; keep edit before generation so a
/// turn matching both resolves deterministically to the edit path.
const RULES: [Rule; 3] = [edit_rule, generate_rule, canned_rule];

lazy_static! {
    static ref EDIT_INTENT: Regex = Regex::new(
        r"(?i)\b(edit|change|modify|retouch|remove|erase|crop|resize|clean up|quita|borra|supprime)\b"
    )
    .unwrap();
    static ref REMOVE_BACKGROUND: Regex = Regex::new(
        r"(?i)\b(remove|erase|delete|cut out)\b.{0,40}\bbackground\b|\bbackground\b.{0,20}\b(removal|removed|gone)\b|\b(quita|supprime)\b.{0,30}\b(fondo|fond)\b"
    )
    .unwrap();
    static ref GENERATE_COMMAND: Regex = Regex::new(r"(?i)^/image\s+(?P<prompt>.+)$").unwrap();
    static ref GENERATE_PHRASE: Regex = Regex::new(
        r"(?i)^(please\s+)?(generate|create|draw|make|paint|dibuja|dessine)\s+(me\s+)?((an?|una|une)\s+)?(image|picture|photo|drawing|illustration|imagen|dessin)\s+(of|de|du)\s+(?P<prompt>.+)$"
    )
    .unwrap();
    static ref CANNED_BUILDER: Regex = Regex::new(
        r"(?i)\bwho\s+(built|created|made)\s+(you|this)\b|\bwhat\s+are\s+you\b"
    )
    .unwrap();
}

/// Classify the latest user turn. Pure: same inputs, same path.
pub fn classify(text: &str, has_asset: bool) -> TurnIntent {
    let text = text.trim();
    for rule in RULES {
        if let Some(intent) = rule(text, has_asset) {
            return intent;
        }
    }
    TurnIntent::Complete
}

fn edit_rule(text: &str, has_asset: bool) -> Option<TurnIntent> {
    if !has_asset || !EDIT_INTENT.is_match(text) {
        return None;
    }
    if REMOVE_BACKGROUND.is_match(text) {
        return Some(TurnIntent::EditImage(EditKind::RemoveBackground));
    }
    Some(TurnIntent::EditImage(EditKind::Unsupported))
}

fn generate_rule(text: &str, has_asset: bool) -> Option<TurnIntent> {
    if has_asset {
        return None;
    }
    GENERATE_COMMAND
        .captures(text)
        .or_else(|| GENERATE_PHRASE.captures(text))
        .map(|caps| TurnIntent::GenerateImage {
            prompt: caps["prompt"].trim().to_string(),
        })
}

fn canned_rule(text: &str, _has_asset: bool) -> Option<TurnIntent> {
    if CANNED_BUILDER.is_match(text) {
        return Some(TurnIntent::Canned {
            answer: BUILDER_ANSWER.to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_falls_through_to_completion() {
        assert_eq!(classify("Explain recursion", false), TurnIntent::Complete);
        assert_eq!(classify("", false), TurnIntent::Complete);
    }

    #[test]
    fn test_command_token_is_stripped_from_prompt() {
        assert_eq!(
            classify("/image a fox in the snow", false),
            TurnIntent::GenerateImage {
                prompt: "a fox in the snow".to_string()
            }
        );
    }

    #[test]
    fn test_generation_phrasings() {
        for text in [
            "generate an image of a lighthouse",
            "Please draw me a picture of a cat",
            "create a photo of mountains at dusk",
            "dibuja una imagen de un zorro",
        ] {
            match classify(text, false) {
                TurnIntent::GenerateImage { prompt } => assert!(!prompt.is_empty(), "{text}"),
                other => panic!("{text:?} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn test_generation_requires_command_position() {
        // Mentions of image generation mid-sentence stay on the completion
        // path (the conservative default).
        assert_eq!(
            classify("how do I generate an image of a chart in css", false),
            TurnIntent::Complete
        );
    }

    #[test]
    fn test_edit_beats_generation_when_asset_attached() {
        let text = "generate a picture of this but remove the background";
        assert_eq!(
            classify(text, true),
            TurnIntent::EditImage(EditKind::RemoveBackground)
        );
        // Without an asset the same words are a generation request.
        assert!(matches!(
            classify(text, false),
            TurnIntent::GenerateImage { .. }
        ));
    }

    #[test]
    fn test_unrecognized_edit_kind_is_acknowledged() {
        assert_eq!(
            classify("please crop this to a square", true),
            TurnIntent::EditImage(EditKind::Unsupported)
        );
    }

    #[test]
    fn test_asset_without_edit_phrasing_is_plain_completion() {
        assert_eq!(classify("what's in this photo?", true), TurnIntent::Complete);
    }

    #[test]
    fn test_canned_questions_bypass_network() {
        for text in ["Who built this?", "who made you", "What are you exactly?"] {
            assert_eq!(
                classify(text, false),
                TurnIntent::Canned {
                    answer: BUILDER_ANSWER.to_string()
                }
            );
        }
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(matches!(
            classify("/IMAGE a boat", false),
            TurnIntent::GenerateImage { .. }
        ));
        assert_eq!(
            classify("REMOVE THE BACKGROUND", true),
            TurnIntent::EditImage(EditKind::RemoveBackground)
        );
    }

    #[test]
    fn test_localized_background_removal() {
        assert_eq!(
            classify("quita el fondo", true),
            TurnIntent::EditImage(EditKind::RemoveBackground)
        );
    }
}
