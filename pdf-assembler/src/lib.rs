//! Deterministic PDF composition (C5): a title page followed by one or more
//! pages per scene (image + text), assembled from an episode's markdown and
//! whichever scene images were successfully generated.

use std::io::{BufWriter, Cursor};

use chrono::{DateTime, Utc};
use manga_types::constants::{
    PDF_MAGIC, PDF_MARGIN_MM, PDF_MAX_IMAGE_HEIGHT_RATIO, PDF_MIN_VALID_BYTES, PDF_PAGE_HEIGHT_MM,
    PDF_PAGE_WIDTH_MM,
};
use manga_types::errors::MangaError;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use scene_extractor::Scene;

const BODY_FONT_SIZE: f64 = 11.0;
const TITLE_FONT_SIZE: f64 = 22.0;
const SUBTITLE_FONT_SIZE: f64 = 13.0;
const CAPTION_FONT_SIZE: f64 = 10.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const CHARS_PER_LINE: usize = 90;

/// One scene as handed to the assembler: its extracted prompt plus whatever
/// image bytes were successfully generated for it (`None` if generation
/// failed for this scene — the page still carries its text).
#[derive(Debug, Clone)]
pub struct SceneContent {
    pub scene: Scene,
    pub image: Option<Vec<u8>>,
}

/// Parses the episode/story title from the first `# ...` markdown heading,
/// falling back to `"Episode"`.
fn parse_title(markdown: &str) -> String {
    markdown
        .lines()
        .find_map(|line| line.trim().strip_prefix('#'))
        .map(|heading| heading.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "Episode".to_string())
}

fn wrap_text(text: &str, max_chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.len() + 1 + word.len() <= max_chars_per_line {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Writes wrapped text starting at `start_y_mm`, spilling onto new pages of
/// the same size/layer-name whenever the content area is exhausted (spec
/// §4.5, "wrapping text across pages as needed"). Returns the layer and `y`
/// position where the caller may continue writing on the same page.
fn write_paragraph_paginated(
    doc: &PdfDocumentReference,
    font: &IndirectFontRef,
    mut layer: PdfLayerReference,
    text: &str,
    font_size: f64,
    mut y: f32,
) -> (PdfLayerReference, f32) {
    for line in wrap_text(text, CHARS_PER_LINE) {
        if y < PDF_MARGIN_MM {
            let (page_index, layer_index) =
                doc.add_page(Mm(PDF_PAGE_WIDTH_MM), Mm(PDF_PAGE_HEIGHT_MM), "Layer 1");
            layer = doc.get_page(page_index).get_layer(layer_index);
            y = PDF_PAGE_HEIGHT_MM - PDF_MARGIN_MM;
        }
        layer.use_text(line, font_size, Mm(PDF_MARGIN_MM), Mm(y), font);
        y -= LINE_HEIGHT_MM;
    }
    (layer, y)
}

/// Assembles one episode's PDF: a title page, then one or more pages per
/// scene combining at most one image with its descriptive text, in the
/// order produced by the scene extractor (C4). Producing zero scene images
/// still yields a valid, text-only PDF.
pub fn assemble_episode_pdf(
    episode_markdown: &str,
    episode_number: u32,
    user_id: &str,
    scenes: &[SceneContent],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, MangaError> {
    let title = parse_title(episode_markdown);
    let _ = user_id;

    let (doc, title_page, title_layer) = PdfDocument::new(
        format!("{title} - Episode {episode_number}"),
        Mm(PDF_PAGE_WIDTH_MM),
        Mm(PDF_PAGE_HEIGHT_MM),
        "Layer 1",
    );
    // printpdf's public API only exposes a document `/Title` entry at
    // construction time (no separate author/subject setter on this version);
    // the title string above folds in the episode number, and `user_id` is
    // recorded in the surrounding MetaStore record instead (see DESIGN.md).
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| MangaError::Internal(format!("failed to load builtin font: {e}")))?;

    let layer = doc.get_page(title_page).get_layer(title_layer);
    let mut y = PDF_PAGE_HEIGHT_MM - PDF_MARGIN_MM;
    layer.use_text(&title, TITLE_FONT_SIZE, Mm(PDF_MARGIN_MM), Mm(y), &font);
    y -= LINE_HEIGHT_MM * 2.0;
    layer.use_text(
        format!("Episode {episode_number}"),
        SUBTITLE_FONT_SIZE,
        Mm(PDF_MARGIN_MM),
        Mm(y),
        &font,
    );
    y -= LINE_HEIGHT_MM * 1.5;
    layer.use_text(
        format!("Generated {}", generated_at.format("%Y-%m-%d")),
        CAPTION_FONT_SIZE,
        Mm(PDF_MARGIN_MM),
        Mm(y),
        &font,
    );

    for content in scenes {
        let (page_index, layer_index) =
            doc.add_page(Mm(PDF_PAGE_WIDTH_MM), Mm(PDF_PAGE_HEIGHT_MM), "Layer 1");
        let layer = doc.get_page(page_index).get_layer(layer_index);
        let mut y = PDF_PAGE_HEIGHT_MM - PDF_MARGIN_MM;

        if let Some(image_bytes) = &content.image {
            let decoder = image::codecs::png::PngDecoder::new(Cursor::new(image_bytes))
                .map_err(|e| MangaError::Internal(format!("invalid scene image bytes: {e}")))?;
            let decoded = Image::try_from(decoder)
                .map_err(|e| MangaError::Internal(format!("failed to decode scene image: {e}")))?;

            let available_width_mm = PDF_PAGE_WIDTH_MM - 2.0 * PDF_MARGIN_MM;
            let available_height_mm = PDF_PAGE_HEIGHT_MM * PDF_MAX_IMAGE_HEIGHT_RATIO;
            let scale_x = available_width_mm / (decoded.image.width.0 as f32 * 25.4 / 300.0);
            let scale_y = available_height_mm / (decoded.image.height.0 as f32 * 25.4 / 300.0);
            let scale = scale_x.min(scale_y).min(1.0);

            let image_top_y = y;
            decoded.add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(PDF_MARGIN_MM)),
                    translate_y: Some(Mm(image_top_y - available_height_mm)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    ..Default::default()
                },
            );
            y = image_top_y - available_height_mm - LINE_HEIGHT_MM;
        }

        layer.use_text(
            format!("Scene {}", content.scene.scene_number),
            SUBTITLE_FONT_SIZE * 0.8,
            Mm(PDF_MARGIN_MM),
            Mm(y),
            &font,
        );
        y -= LINE_HEIGHT_MM * 1.5;

        write_paragraph_paginated(&doc, &font, layer, &content.scene.description, BODY_FONT_SIZE, y);
    }

    let mut bytes = Vec::new();
    {
        let mut writer = BufWriter::new(&mut bytes);
        doc.save(&mut writer)
            .map_err(|e| MangaError::Internal(format!("failed to serialize pdf: {e}")))?;
    }
    Ok(bytes)
}

/// Sanity check applied after assembly and before persisting to the blob
/// store: the bytes must carry the PDF magic header and clear a minimum
/// size, since a truncated write would otherwise look like success.
pub fn is_valid_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_MIN_VALID_BYTES && bytes.starts_with(PDF_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png() -> Vec<u8> {
        // A minimal 1x1 transparent PNG.
        vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ]
    }

    #[test]
    fn wraps_text_without_exceeding_width() {
        let long_line = "word ".repeat(40);
        let lines = wrap_text(&long_line, 20);
        for line in &lines {
            assert!(line.len() <= 20);
        }
    }

    #[test]
    fn parses_title_from_heading_or_falls_back() {
        assert_eq!(parse_title("# The Last Blade\n\nBody."), "The Last Blade");
        assert_eq!(parse_title("No heading here."), "Episode");
    }

    #[test]
    fn assembles_a_valid_pdf_with_scenes() {
        let scenes = vec![
            SceneContent {
                scene: Scene {
                    scene_number: 1,
                    description: "A tense standoff at dawn.".into(),
                },
                image: Some(sample_png()),
            },
            SceneContent {
                scene: Scene {
                    scene_number: 2,
                    description: "The city skyline under a blood moon.".into(),
                },
                image: None,
            },
        ];

        let pdf = assemble_episode_pdf(
            "# The Last Blade\n\nIt was a dark and stormy night.",
            1,
            "u1",
            &scenes,
            Utc::now(),
        )
        .expect("pdf assembly should succeed");

        assert!(is_valid_pdf(&pdf));
    }

    #[test]
    fn assembles_a_text_only_pdf_when_no_images_succeeded() {
        let scenes = vec![SceneContent {
            scene: Scene {
                scene_number: 1,
                description: "A long narrated scene with no generated image available.".into(),
            },
            image: None,
        }];

        let pdf = assemble_episode_pdf("# Untitled", 2, "u1", &scenes, Utc::now())
            .expect("text-only pdf assembly should succeed");
        assert!(is_valid_pdf(&pdf));
    }

    #[test]
    fn rejects_truncated_output() {
        assert!(!is_valid_pdf(b"%PDF-1.7"));
        assert!(!is_valid_pdf(&vec![0u8; PDF_MIN_VALID_BYTES]));
    }
}
