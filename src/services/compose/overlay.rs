//! Dialogue overlays drawn on top of a panel's artwork: captions, speech and
//! thought bubbles, the panel number badge and the "Image unavailable" label.
//! Same coordinate system as [`super::layout`].

use super::layout::{Rect, TextLine};
use crate::core::model::{classify, DialogueKind, StoryPanel};
use crate::utils::text::{text_width, truncate_to_width, wrap_text};

pub const PADDING: f32 = 8.0;
pub const SPACING: f32 = 6.0;
pub const TEXT_SIZE: f32 = 9.0;
pub const SPEAKER_SIZE: f32 = 7.5;
pub const BADGE_RADIUS: f32 = 13.0;
pub const BADGE_TEXT_SIZE: f32 = 13.0;
pub const UNAVAILABLE_TEXT: &str = "Image unavailable";

const LINE_HEIGHT: f32 = 1.25;
const INNER: f32 = 6.0;
const SPEAKER_GAP: f32 = 3.0;
const BUBBLE_MAX_WIDTH: f32 = 0.85;
const CAPTION_WIDTH: f32 = 11.0 / 12.0;
const TAIL_WIDTH: f32 = 12.0;
const TAIL_HEIGHT: f32 = 6.0;
const TAIL_INSET: f32 = 12.0;
const THOUGHT_TAIL_HEIGHT: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayStyle {
    Caption,
    Speech,
    Thought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tail {
    /// Downward triangle under a speech bubble.
    Pointer([(f32, f32); 3]),
    /// Trailing circles under a thought bubble, as (cx, cy, r).
    Dots(Vec<(f32, f32, f32)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub style: OverlayStyle,
    pub align: Align,
    pub plate: Rect,
    pub speaker: Option<TextLine>,
    pub lines: Vec<TextLine>,
    pub tail: Option<Tail>,
}

impl OverlayBox {
    /// Plate plus tail.
    pub fn extent(&self) -> Rect {
        let tail = match self.tail {
            Some(Tail::Pointer(_)) => TAIL_HEIGHT,
            Some(Tail::Dots(_)) => THOUGHT_TAIL_HEIGHT,
            None => 0.0,
        };
        Rect::new(self.plate.x, self.plate.y, self.plate.width, self.plate.height + tail)
    }
}

fn block_height(lines: usize, size: f32) -> f32 {
    if lines == 0 {
        0.0
    } else {
        size + (lines as f32 - 1.0) * size * LINE_HEIGHT
    }
}

/// Lays out the visible dialogue of `panel` inside `cell`, bottom-up: the
/// first entry sits lowest. Entries that no longer fit are left out.
pub fn layout_overlays(panel: &StoryPanel, cell: Rect) -> Vec<OverlayBox> {
    let mut boxes = Vec::new();
    let mut cursor = cell.bottom() - PADDING;
    let ceiling = cell.y + PADDING;
    let max_bubble = (cell.width * BUBBLE_MAX_WIDTH).min(cell.width - 2.0 * PADDING);
    let mut speech_count = 0usize;

    for entry in panel.dialogues.iter().filter(|d| d.is_visible()) {
        let text = entry.text.trim();
        let overlay = match classify(entry) {
            DialogueKind::Caption => caption_box(text, cell, cursor),
            DialogueKind::Thought => thought_box(text, cell, cursor, max_bubble),
            DialogueKind::Speech { speaker } => {
                let align = if speech_count % 2 == 0 {
                    Align::Left
                } else {
                    Align::Right
                };
                speech_count += 1;
                speech_box(&speaker, text, cell, cursor, max_bubble, align)
            }
        };

        if overlay.plate.y < ceiling {
            break;
        }
        cursor = overlay.plate.y - SPACING;
        boxes.push(overlay);
    }
    boxes
}

fn caption_box(text: &str, cell: Rect, bottom: f32) -> OverlayBox {
    let width = cell.width * CAPTION_WIDTH;
    let wrapped = wrap_text(text, TEXT_SIZE, false, width - 2.0 * INNER);
    let height = block_height(wrapped.len(), TEXT_SIZE) + 2.0 * INNER;
    let plate = Rect::new(cell.x + (cell.width - width) / 2.0, bottom - height, width, height);
    let center = plate.x + width / 2.0;

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let baseline = plate.y + INNER + TEXT_SIZE + i as f32 * TEXT_SIZE * LINE_HEIGHT;
            TextLine {
                italic: true,
                ..TextLine::centered(line, center, baseline, TEXT_SIZE, false)
            }
        })
        .collect();

    OverlayBox {
        style: OverlayStyle::Caption,
        align: Align::Center,
        plate,
        speaker: None,
        lines,
        tail: None,
    }
}

fn speech_box(
    speaker: &str,
    text: &str,
    cell: Rect,
    bottom: f32,
    max_width: f32,
    align: Align,
) -> OverlayBox {
    let label = truncate_to_width(
        &speaker.trim().to_uppercase(),
        SPEAKER_SIZE,
        true,
        max_width - 2.0 * INNER,
    );
    let wrapped = wrap_text(text, TEXT_SIZE, false, max_width - 2.0 * INNER);
    let content = wrapped
        .iter()
        .map(|l| text_width(l, TEXT_SIZE, false))
        .fold(text_width(&label, SPEAKER_SIZE, true), f32::max);
    let width = (content + 2.0 * INNER).min(max_width);
    let text_height = SPEAKER_SIZE + SPEAKER_GAP + block_height(wrapped.len(), TEXT_SIZE);
    let height = text_height + 2.0 * INNER;

    let x = match align {
        Align::Right => cell.right() - PADDING - width,
        _ => cell.x + PADDING,
    };
    let plate = Rect::new(x, bottom - TAIL_HEIGHT - height, width, height);

    let speaker_line = TextLine {
        text: label,
        x: plate.x + INNER,
        baseline: plate.y + INNER + SPEAKER_SIZE,
        size: SPEAKER_SIZE,
        bold: true,
        italic: false,
    };
    let first = speaker_line.baseline + SPEAKER_GAP + TEXT_SIZE;
    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, line)| TextLine {
            text: line,
            x: plate.x + INNER,
            baseline: first + i as f32 * TEXT_SIZE * LINE_HEIGHT,
            size: TEXT_SIZE,
            bold: false,
            italic: false,
        })
        .collect();

    let base_left = match align {
        Align::Right => plate.right() - TAIL_INSET - TAIL_WIDTH,
        _ => plate.x + TAIL_INSET,
    };
    let tail = Tail::Pointer([
        (base_left, plate.bottom()),
        (base_left + TAIL_WIDTH, plate.bottom()),
        (base_left + TAIL_WIDTH / 2.0, plate.bottom() + TAIL_HEIGHT),
    ]);

    OverlayBox {
        style: OverlayStyle::Speech,
        align,
        plate,
        speaker: Some(speaker_line),
        lines,
        tail: Some(tail),
    }
}

fn thought_box(text: &str, cell: Rect, bottom: f32, max_width: f32) -> OverlayBox {
    let wrapped = wrap_text(text, TEXT_SIZE, false, max_width - 2.0 * INNER);
    let content = wrapped
        .iter()
        .map(|l| text_width(l, TEXT_SIZE, false))
        .fold(0.0, f32::max);
    let width = (content + 2.0 * INNER).min(max_width);
    let height = block_height(wrapped.len(), TEXT_SIZE) + 2.0 * INNER;
    let plate = Rect::new(
        cell.right() - PADDING - width,
        bottom - THOUGHT_TAIL_HEIGHT - height,
        width,
        height,
    );
    let center = plate.x + width / 2.0;

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let baseline = plate.y + INNER + TEXT_SIZE + i as f32 * TEXT_SIZE * LINE_HEIGHT;
            TextLine {
                italic: true,
                ..TextLine::centered(line, center, baseline, TEXT_SIZE, false)
            }
        })
        .collect();

    let anchor = plate.right() - 18.0;
    let tail = Tail::Dots(vec![
        (anchor, plate.bottom() + 4.0, 3.0),
        (anchor + 7.0, plate.bottom() + 8.0, 2.0),
    ]);

    OverlayBox {
        style: OverlayStyle::Thought,
        align: Align::Right,
        plate,
        speaker: None,
        lines,
        tail: Some(tail),
    }
}

/// Circled panel number in the top-left corner: ((cx, cy), label).
pub fn panel_badge(number: usize, cell: Rect) -> ((f32, f32), TextLine) {
    let center = (cell.x + PADDING + BADGE_RADIUS, cell.y + PADDING + BADGE_RADIUS);
    let label = TextLine::centered(
        number.to_string(),
        center.0,
        center.1 + BADGE_TEXT_SIZE * 0.35,
        BADGE_TEXT_SIZE,
        true,
    );
    (center, label)
}

pub fn unavailable_label(cell: Rect) -> TextLine {
    let size = 12.0;
    TextLine {
        italic: true,
        ..TextLine::centered(
            UNAVAILABLE_TEXT,
            cell.x + cell.width / 2.0,
            cell.y + cell.height / 2.0 + size * 0.35,
            size,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::DialogueEntry;

    fn cell() -> Rect {
        Rect::new(40.0, 40.0, 247.5, 247.5)
    }

    fn say(speaker: Option<&str>, text: &str) -> DialogueEntry {
        DialogueEntry::new(speaker.map(str::to_string), text)
    }

    #[test]
    fn test_first_entry_sits_lowest() {
        let panel = StoryPanel::new("street", "smiling")
            .with_dialogue(say(None, "Meanwhile..."))
            .with_dialogue(say(Some("Nova"), "Hi!"))
            .with_dialogue(say(Some("Nova (thought)"), "Hmm."));

        let boxes = layout_overlays(&panel, cell());
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].style, OverlayStyle::Caption);
        assert_eq!(boxes[1].style, OverlayStyle::Speech);
        assert_eq!(boxes[2].style, OverlayStyle::Thought);

        assert!((boxes[0].extent().bottom() - (cell().bottom() - PADDING)).abs() < 1e-3);
        for pair in boxes.windows(2) {
            assert!(pair[1].extent().bottom() <= pair[0].plate.y - SPACING + 1e-3);
        }
    }

    #[test]
    fn test_speech_alternates_and_speaker_is_upper_cased() {
        let panel = StoryPanel::new("s", "e")
            .with_dialogue(say(Some("Nova"), "One"))
            .with_dialogue(say(None, "Caption in between"))
            .with_dialogue(say(Some("Chief"), "Two"))
            .with_dialogue(say(Some("Nova"), "Three"));

        let boxes = layout_overlays(&panel, cell());
        let aligns: Vec<Align> = boxes
            .iter()
            .filter(|b| b.style == OverlayStyle::Speech)
            .map(|b| b.align)
            .collect();
        assert_eq!(aligns, vec![Align::Left, Align::Right, Align::Left]);

        assert_eq!(boxes[0].speaker.as_ref().unwrap().text, "NOVA");
        assert!(boxes[0].speaker.as_ref().unwrap().bold);
        assert!((boxes[0].plate.x - (cell().x + PADDING)).abs() < 1e-3);
        assert!((boxes[2].plate.right() - (cell().right() - PADDING)).abs() < 1e-3);
    }

    #[test]
    fn test_caption_and_bubble_widths() {
        let long = "A very long line of narration that will certainly need to wrap across several lines of the caption plate";
        let panel = StoryPanel::new("s", "e")
            .with_dialogue(say(None, long))
            .with_dialogue(say(Some("Nova"), long));

        let boxes = layout_overlays(&panel, cell());
        assert!((boxes[0].plate.width - cell().width * 11.0 / 12.0).abs() < 1e-3);
        assert!(boxes[0].lines.len() > 1);
        assert!(boxes[0].lines.iter().all(|l| l.italic));
        assert!(boxes[1].plate.width <= cell().width * 0.85 + 1e-3);
    }

    #[test]
    fn test_long_speaker_label_stays_on_plate() {
        let speaker = "Commander Aurelia Maximiliana Vostrikova-Delacroix III";
        let panel = StoryPanel::new("s", "e").with_dialogue(say(Some(speaker), "Report."));

        let boxes = layout_overlays(&panel, cell());
        let plate = boxes[0].plate;
        let label = boxes[0].speaker.as_ref().unwrap();
        let right = label.x + text_width(&label.text, SPEAKER_SIZE, true);

        assert!(label.text.ends_with("..."));
        assert!(right <= plate.right() - INNER + 1e-3);
        assert!(right <= cell().right());
        assert!(cell().contains(&boxes[0].extent()));
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let panel = StoryPanel::new("s", "e")
            .with_dialogue(say(Some("Nova"), "   "))
            .with_dialogue(say(Some("Chief"), "Visible"));

        let boxes = layout_overlays(&panel, cell());
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].speaker.as_ref().unwrap().text, "CHIEF");
        // the skipped entry does not count towards alternation
        assert_eq!(boxes[0].align, Align::Left);
    }

    #[test]
    fn test_overflow_is_omitted_not_drawn_outside() {
        let mut panel = StoryPanel::new("s", "e");
        for i in 0..30 {
            panel = panel.with_dialogue(say(None, &format!("Caption number {}", i)));
        }

        let boxes = layout_overlays(&panel, cell());
        assert!(!boxes.is_empty());
        assert!(boxes.len() < 30);
        for b in &boxes {
            assert!(cell().contains(&b.extent()));
        }
    }

    #[test]
    fn test_badge_and_label_inside_cell() {
        let ((cx, cy), label) = panel_badge(3, cell());
        assert_eq!(label.text, "3");
        assert!(cx - BADGE_RADIUS >= cell().x && cy - BADGE_RADIUS >= cell().y);

        let label = unavailable_label(cell());
        assert_eq!(label.text, UNAVAILABLE_TEXT);
        assert!(label.x > cell().x && label.x < cell().right());
    }
}
