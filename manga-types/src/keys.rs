//! BlobStore key layout: deterministic, parseable paths so the
//! image/PDF handler can locate sibling objects without a metadata lookup.
//!
//! ```text
//! stories/{userId}/{storyId}/story.md
//! episodes/{userId}/{storyId}/{NNN}/episode.md
//! episodes/{userId}/{storyId}/{NNN}/images/image-{MMM}.png
//! episodes/{userId}/{storyId}/{NNN}/episode.pdf
//! ```
//! `NNN`/`MMM` are 3-digit, zero-padded, 1-based.

use crate::errors::MangaError;

fn format_index(n: u32) -> String {
    format!("{n:03}")
}

pub fn story_key(user_id: &str, story_id: &str) -> String {
    format!("stories/{user_id}/{story_id}/story.md")
}

pub fn episode_key(user_id: &str, story_id: &str, episode_number: u32) -> String {
    format!(
        "episodes/{user_id}/{story_id}/{}/episode.md",
        format_index(episode_number)
    )
}

pub fn episode_image_key(
    user_id: &str,
    story_id: &str,
    episode_number: u32,
    scene_number: u32,
) -> String {
    format!(
        "episodes/{user_id}/{story_id}/{}/images/image-{}.png",
        format_index(episode_number),
        format_index(scene_number)
    )
}

pub fn episode_pdf_key(user_id: &str, story_id: &str, episode_number: u32) -> String {
    format!(
        "episodes/{user_id}/{story_id}/{}/episode.pdf",
        format_index(episode_number)
    )
}

/// Parsed components of an `episodes/...` key, recovered without a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpisodeKey {
    pub user_id: String,
    pub story_id: String,
    pub episode_number: u32,
}

/// Recovers `(userId, storyId, episodeNumber)` from an `episodes/{userId}/{storyId}/{NNN}/...` key.
///
/// Used by the image handler (C10), which receives only `episodeS3Key` on the wire
/// and must derive the sibling `images/` and `episode.pdf` locations.
pub fn parse_episode_key(key: &str) -> Result<ParsedEpisodeKey, MangaError> {
    let mut parts = key.split('/');
    let root = parts
        .next()
        .ok_or_else(|| MangaError::Validation(format!("malformed episode key: {key}")))?;
    if root != "episodes" {
        return Err(MangaError::Validation(format!(
            "expected key to start with 'episodes/': {key}"
        )));
    }
    let user_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MangaError::Validation(format!("malformed episode key: {key}")))?;
    let story_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MangaError::Validation(format!("malformed episode key: {key}")))?;
    let nnn = parts
        .next()
        .ok_or_else(|| MangaError::Validation(format!("malformed episode key: {key}")))?;
    if nnn.len() != 3 || !nnn.chars().all(|c| c.is_ascii_digit()) {
        return Err(MangaError::Validation(format!(
            "expected 3-digit episode segment, got '{nnn}' in: {key}"
        )));
    }
    let episode_number: u32 = nnn
        .parse()
        .map_err(|_| MangaError::Validation(format!("non-numeric episode segment in: {key}")))?;
    if episode_number == 0 {
        return Err(MangaError::Validation(format!(
            "episode number must be >= 1, got 0 in: {key}"
        )));
    }
    Ok(ParsedEpisodeKey {
        user_id: user_id.to_string(),
        story_id: story_id.to_string(),
        episode_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded_three_digit_indices() {
        assert_eq!(episode_key("u1", "s1", 1), "episodes/u1/s1/001/episode.md");
        assert_eq!(episode_key("u1", "s1", 42), "episodes/u1/s1/042/episode.md");
        assert_eq!(
            episode_image_key("u1", "s1", 1, 7),
            "episodes/u1/s1/001/images/image-007.png"
        );
        assert_eq!(
            episode_pdf_key("u1", "s1", 1),
            "episodes/u1/s1/001/episode.pdf"
        );
        assert_eq!(story_key("u1", "s1"), "stories/u1/s1/story.md");
    }

    #[test]
    fn parses_round_trip() {
        let key = episode_key("user-42", "story-7", 3);
        let parsed = parse_episode_key(&key).unwrap();
        assert_eq!(parsed.user_id, "user-42");
        assert_eq!(parsed.story_id, "story-7");
        assert_eq!(parsed.episode_number, 3);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_episode_key("stories/u1/s1/story.md").is_err());
        assert!(parse_episode_key("episodes/u1/s1/7/episode.md").is_err());
        assert!(parse_episode_key("episodes/u1/s1/000/episode.md").is_err());
        assert!(parse_episode_key("episodes//s1/001/episode.md").is_err());
    }
}
