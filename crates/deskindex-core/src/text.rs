//! Content normalization applied to every extracted text.

/// Trims each line and collapses runs of blank lines into one.
///
/// Leading and trailing blank lines are dropped; lines are joined with `\n`.
pub fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_blank = false;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(line);
    }
    out
}

/// Cuts `s` to at most `max` characters. Returns `true` if anything was cut.
pub fn truncate_chars(s: &mut String, max: usize) -> bool {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => {
            s.truncate(byte_idx);
            true
        }
        None => false,
    }
}

/// Normalizes then truncates, so the stored length never exceeds `max`.
pub fn prepare_content(raw: &str, max: usize) -> String {
    let mut content = normalize_whitespace(raw);
    if truncate_chars(&mut content, max) {
        let kept = content.trim_end().len();
        content.truncate(kept);
    }
    content
}
