/// Removes a surrounding Markdown code fence from model output.
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

/// Approximate advance of one character in Helvetica, in ems.
fn glyph_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '!' | '|' => 0.25,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' => 0.3,
        'm' | 'w' | 'M' | 'W' | '@' => 0.85,
        '0'..='9' => 0.556,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii() => 0.53,
        // CJK and other wide scripts
        _ => 1.0,
    }
}

/// Estimated width of `text` in points. Built-in PDF fonts carry no metrics we
/// can query, so layout works from this table.
pub fn text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let ems: f32 = text.chars().map(glyph_width).sum();
    let weight = if bold { 1.06 } else { 1.0 };
    ems * font_size * weight
}

/// Greedy word wrap to `max_width` points. Words longer than a line are split.
pub fn wrap_text(text: &str, font_size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if text_width(&candidate, font_size, bold) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if text_width(word, font_size, bold) <= max_width {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    current.push(c);
                    if text_width(&current, font_size, bold) > max_width && current.chars().count() > 1 {
                        let last = current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.extend(last);
                    }
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Shortens `text` to fit `max_width` points, ending it with "..." when cut.
pub fn truncate_to_width(text: &str, font_size: f32, bold: bool, max_width: f32) -> String {
    if text_width(text, font_size, bold) <= max_width {
        return text.to_string();
    }
    let budget = max_width - text_width(ELLIPSIS, font_size, bold);
    let mut kept = String::new();
    for c in text.chars() {
        kept.push(c);
        if text_width(&kept, font_size, bold) > budget {
            kept.pop();
            break;
        }
    }
    let kept = kept.trim_end();
    if kept.is_empty() {
        return String::new();
    }
    format!("{}{}", kept, ELLIPSIS)
}

const ELLIPSIS: &str = "...";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("```\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("  ```json  \n  []  \n  ```  "), "[]");
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "The quick brown fox jumps over the lazy dog again and again";
        let lines = wrap_text(text, 12.0, false, 100.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 12.0, false) <= 100.0, "{line} too wide");
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap_text("Supercalifragilisticexpialidocious", 20.0, true, 60.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "Supercalifragilisticexpialidocious");
    }

    #[test]
    fn test_wrap_empty() {
        assert!(wrap_text("   ", 12.0, false, 100.0).is_empty());
    }

    #[test]
    fn test_bold_is_wider() {
        assert!(text_width("Comic", 10.0, true) > text_width("Comic", 10.0, false));
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("Nova", 10.0, true, 100.0), "Nova");

        let long = "CAPTAIN NOVA STARFALL OF THE ORBITAL RESCUE BRIGADE";
        let cut = truncate_to_width(long, 10.0, true, 80.0);
        assert!(cut.ends_with("..."));
        assert!(text_width(&cut, 10.0, true) <= 80.0);
        assert!(long.starts_with(cut.trim_end_matches("...")));

        assert_eq!(truncate_to_width("WIDE", 10.0, true, 5.0), "");
    }
}
