//! Fenced front-matter splitting.
//!
//! Included files may open with a `---` fenced preamble. The pipeline only
//! ever discards it: the body after the closing fence is what gets parsed
//! and spliced, and the preamble is never merged into host metadata.

const FENCE: &str = "---";

/// Split a leading fenced preamble from `source`.
///
/// Returns the preamble text (fences excluded) and the remaining body. A
/// document that does not open with a fence, or whose fence is never
/// closed, is returned whole as the body.
pub fn split(source: &str) -> (Option<&str>, &str) {
    let text = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(rest) = open_fence(text) else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == FENCE {
            let matter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(matter), body);
        }
        offset += line.len();
    }

    (None, source)
}

fn open_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    if let Some(after) = rest.strip_prefix("\r\n") {
        return Some(after);
    }
    rest.strip_prefix('\n')
}
