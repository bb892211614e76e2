/// Calculate the display width of a string, accounting for wide characters
pub fn display_width(s: &str) -> usize {
    s.chars()
        .map(|c| {
            match c {
            // Most CJK characters take 2 columns
            '\u{1100}'..='\u{115F}' |  // Hangul Jamo
            '\u{2E80}'..='\u{303F}' |  // CJK radicals, Kangxi, symbols
            '\u{3040}'..='\u{33FF}' |  // Kana, Bopomofo, Hangul compat, CJK compat
            '\u{3400}'..='\u{4DBF}' |  // CJK Unified Ideographs Extension A
            '\u{4E00}'..='\u{9FFF}' |  // CJK Unified Ideographs
            '\u{A000}'..='\u{A4CF}' |  // Yi
            '\u{AC00}'..='\u{D7AF}' |  // Hangul Syllables
            '\u{F900}'..='\u{FAFF}' |  // CJK Compatibility Ideographs
            '\u{FE10}'..='\u{FE19}' |  // Vertical Forms
            '\u{FE30}'..='\u{FE6F}' |  // CJK compatibility forms, small variants
            '\u{FF00}'..='\u{FFEF}' |  // Halfwidth and Fullwidth Forms
            '\u{20000}'..='\u{2EBEF}' => 2, // CJK extensions B-F
            _ => 1,
        }
        })
        .sum()
}

/// Wrap a string into lines with a given maximum display width.
pub fn wrap_text(text: &str, max_line_len: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut remaining = text;
    let max_line_len = max_line_len.max(1);

    while !remaining.is_empty() {
        if display_width(remaining) <= max_line_len {
            lines.push(remaining.to_string());
            break;
        }

        // Try to break at a space within display width limit
        let mut break_pos = 0;
        let mut char_end = 0;
        let mut current_width = 0;
        for (pos, ch) in remaining.char_indices() {
            let char_width = display_width(ch.encode_utf8(&mut [0; 4]));
            if ch == ' ' {
                break_pos = pos;
            }
            if current_width + char_width > max_line_len {
                break;
            }
            char_end = pos + ch.len_utf8();
            current_width += char_width;
        }

        if break_pos > 0 {
            lines.push(remaining[..break_pos].to_string());
            remaining = remaining[break_pos + 1..].trim_start();
        } else {
            // a single glyph wider than the line still has to make progress
            let char_end = if char_end == 0 {
                remaining.chars().next().map_or(remaining.len(), char::len_utf8)
            } else {
                char_end
            };
            lines.push(remaining[..char_end].to_string());
            remaining = &remaining[char_end..];
        }
    }
    lines
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}
