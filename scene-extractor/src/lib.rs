//! Pure parser (C4) that turns one episode's markdown into a bounded list of
//! scene image prompts. No I/O; every input produces at least one scene,
//! falling back to a generic description when the derived text is too short
//! to be useful. Same markdown in, same prompt list out, every time.
//!
//! Algorithm:
//! 1. Strip an optional leading `---`-fenced metadata block.
//! 2. Segment by recognized scene-break markers: a line matching
//!    `[Scene Break]`, `[New Scene]`, `---`, or `****` (case-insensitive,
//!    whitespace-trimmed).
//! 3. If no break markers are found, segment by grouping every 3 non-empty
//!    paragraphs.
//! 4. Derive each segment's visual description: strip quoted dialogue,
//!    leading `Name:` speaker tags, markdown decoration, and bracketed
//!    stage directions; keep the first three sentence-like fragments
//!    (length >= 10, containing a space); re-append any bracketed hint
//!    found in the segment; truncate to <= 300 chars on a word boundary.
//! 5. Descriptions shorter than 15 characters fall back to a fixed generic
//!    description.
//! 6. Cap the scene list at 8; drop the tail.

use manga_types::constants::{
    FALLBACK_SCENE_DESCRIPTION, MAX_SCENES_PER_EPISODE, MAX_SCENE_DESCRIPTION_CHARS,
    MIN_SCENE_DESCRIPTION_CHARS,
};
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// 1-based, matches the `{MMM}` index used in blob store image keys.
    pub scene_number: u32,
    pub description: String,
}

fn front_matter_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\s*---\n.*?\n---\s*\n").expect("static pattern is valid"))
}

fn scene_break_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^\s*(?:\[scene break\]|\[new scene\]|-{3,}|\*{4,})\s*$")
            .expect("static pattern is valid")
    })
}

fn quoted_dialogue_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("static pattern is valid"))
}

fn speaker_tag_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[A-Z][A-Za-z0-9 ']{0,30}:\s*").expect("static pattern is valid"))
}

fn bracketed_direction_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]").expect("static pattern is valid"))
}

fn markdown_decoration_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#*_`]").expect("static pattern is valid"))
}

fn whitespace_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern is valid"))
}

fn sentence_split_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:[.!?]+\s+|\n+)").expect("static pattern is valid"))
}

/// Strips a leading `---`-fenced metadata block, if present.
fn strip_front_matter(markdown: &str) -> &str {
    match front_matter_pattern().find(markdown) {
        Some(m) if m.start() == 0 => &markdown[m.end()..],
        _ => markdown,
    }
}

/// Splits the body on recognized scene-break markers. Returns `None` when no
/// marker is present anywhere in the body, signaling the paragraph-grouping
/// fallback (step 3).
fn split_on_break_markers(body: &str) -> Option<Vec<String>> {
    if !scene_break_pattern().is_match(body) {
        return None;
    }
    let blocks: Vec<String> = scene_break_pattern()
        .split(body)
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
        .collect();
    Some(blocks)
}

/// Fallback segmentation (step 3): group every 3 non-empty paragraphs.
fn split_by_paragraph_groups(body: &str) -> Vec<String> {
    let paragraphs: Vec<&str> = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return vec![body.trim().to_string()];
    }

    paragraphs
        .chunks(3)
        .map(|chunk| chunk.join("\n\n"))
        .collect()
}

/// Extracts any bracketed stage-direction/hint text from a segment, e.g.
/// `[wide shot, dusk lighting]`, so it can be re-appended to the derived
/// description after the bracket itself is stripped from the prose.
fn extract_bracketed_hint(segment: &str) -> Option<String> {
    bracketed_direction_pattern()
        .captures_iter(segment)
        .map(|caps| caps[1].trim().to_string())
        .find(|hint| !hint.is_empty())
}

/// Derives a visual description from one scene segment (step 4).
fn derive_description(segment: &str) -> String {
    let hint = extract_bracketed_hint(segment);

    let no_dialogue = quoted_dialogue_pattern().replace_all(segment, " ");
    let no_speaker_tags = speaker_tag_pattern().replace_all(&no_dialogue, "");
    let no_brackets = bracketed_direction_pattern().replace_all(&no_speaker_tags, " ");
    let no_markdown = markdown_decoration_pattern().replace_all(&no_brackets, "");
    let normalized = whitespace_pattern()
        .replace_all(&no_markdown, " ")
        .trim()
        .to_string();

    let fragments: Vec<&str> = sentence_split_pattern()
        .split(&normalized)
        .map(str::trim)
        .filter(|f| f.len() >= 10 && f.contains(' '))
        .take(3)
        .collect();

    let mut description = fragments.join(". ");
    if let Some(hint) = hint {
        if !description.is_empty() {
            description.push_str(" (");
            description.push_str(&hint);
            description.push(')');
        } else {
            description = hint;
        }
    }

    truncate_at_word_boundary(description.trim(), MAX_SCENE_DESCRIPTION_CHARS)
}

fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(idx) if idx > 0 => truncated[..idx].to_string(),
        _ => truncated,
    }
}

/// Extracts scene image prompts from one episode's markdown body.
pub fn extract_scenes(markdown: &str) -> Vec<Scene> {
    let body = strip_front_matter(markdown);

    let mut blocks = match split_on_break_markers(body) {
        Some(blocks) if !blocks.is_empty() => blocks,
        _ => split_by_paragraph_groups(body),
    };

    if blocks.is_empty() {
        blocks.push(body.trim().to_string());
    }

    if blocks.len() > MAX_SCENES_PER_EPISODE {
        let dropped = blocks.len() - MAX_SCENES_PER_EPISODE;
        warn!(dropped, cap = MAX_SCENES_PER_EPISODE, "dropping scenes past the per-episode cap");
        blocks.truncate(MAX_SCENES_PER_EPISODE);
    }

    blocks
        .into_iter()
        .enumerate()
        .map(|(idx, block)| {
            let derived = derive_description(&block);
            let description = if derived.chars().count() < MIN_SCENE_DESCRIPTION_CHARS {
                FALLBACK_SCENE_DESCRIPTION.to_string()
            } else {
                derived
            };
            Scene {
                scene_number: idx as u32 + 1,
                description,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_horizontal_rule_markers() {
        let markdown = "Kenji draws his blade in the rain soaked alley, breath ragged.\n\n---\n\nThe crowd parts as the masked figure steps into the neon lit square.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].scene_number, 1);
        assert_eq!(scenes[1].scene_number, 2);
        assert!(scenes[0].description.contains("Kenji"));
    }

    #[test]
    fn splits_on_bracketed_break_markers() {
        let markdown = "A quiet morning settles over the dojo courtyard before the coming storm.\n[Scene Break]\nLightning splits the sky as the long awaited duel finally begins.\n[New Scene]\nThe dust settles over the broken courtyard stones at last.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 3);
    }

    #[test]
    fn splits_on_asterisk_markers() {
        let markdown = "The ship groans as it crests the final wave before the harbor.\n****\nSailors scramble across the deck shouting orders into the wind.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 2);
    }

    #[test]
    fn strips_leading_front_matter_block() {
        let markdown = "---\ntitle: Episode One\nmood: tense\n---\nThe courtyard stands empty under a pale grey sky this morning.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 1);
        assert!(!scenes[0].description.to_lowercase().contains("title"));
    }

    #[test]
    fn missing_break_marker_groups_by_three_paragraphs() {
        let paragraphs: Vec<String> = (1..=7)
            .map(|n| format!("Paragraph number {n} describing a moment of the story in enough detail."))
            .collect();
        let markdown = paragraphs.join("\n\n");
        let scenes = extract_scenes(&markdown);
        // 7 paragraphs grouped by 3 => 3 scenes (3, 3, 1).
        assert_eq!(scenes.len(), 3);
    }

    #[test]
    fn single_paragraph_without_breaks_yields_one_scene() {
        let markdown = "A long single paragraph of prose with no explicit scene break marker anywhere in it at all.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].scene_number, 1);
    }

    #[test]
    fn caps_scene_count_at_maximum() {
        let markdown = (1..=12)
            .map(|n| format!("Scene block number {n} with enough descriptive prose content here."))
            .collect::<Vec<_>>()
            .join("\n---\n");
        let scenes = extract_scenes(&markdown);
        assert_eq!(scenes.len(), MAX_SCENES_PER_EPISODE);
    }

    #[test]
    fn short_descriptions_fall_back() {
        let markdown = "Ok.";
        let scenes = extract_scenes(markdown);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].description, FALLBACK_SCENE_DESCRIPTION);
    }

    #[test]
    fn long_descriptions_are_truncated_at_word_boundary() {
        let long_sentence = "word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word word";
        let scenes = extract_scenes(long_sentence);
        assert!(scenes[0].description.chars().count() <= MAX_SCENE_DESCRIPTION_CHARS);
        assert!(!scenes[0].description.ends_with(' '));
    }

    #[test]
    fn strips_dialogue_speaker_tags_and_markdown_decoration() {
        let markdown = "Kenji: \"We end this tonight.\" **Kenji** draws his blade and glances toward the old shrine with dread in his heart this evening.";
        let scenes = extract_scenes(markdown);
        assert!(!scenes[0].description.contains('"'));
        assert!(!scenes[0].description.contains("Kenji:"));
        assert!(!scenes[0].description.contains('*'));
    }

    #[test]
    fn preserves_bracketed_hint_as_a_suffix() {
        let markdown = "The duel begins as thunder rolls over the courtyard stones below. [wide shot, dusk lighting]";
        let scenes = extract_scenes(markdown);
        assert!(scenes[0].description.contains("wide shot"));
        assert!(!scenes[0].description.contains('['));
    }

    #[test]
    fn determinism_same_input_same_output() {
        let markdown = "Kenji draws his blade.\n---\nThe crowd parts as the masked figure arrives in the square.";
        assert_eq!(extract_scenes(markdown), extract_scenes(markdown));
    }
}
