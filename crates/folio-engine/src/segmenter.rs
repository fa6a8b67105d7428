//! Boundary-aware chunking of chapter text.
//!
//! Splits text into ordered, size-bounded chunks at the best natural
//! boundary available near each target cut. Paragraph and sentence
//! boundaries are preferred so the transformer never sees a sentence split
//! mid-thought, which keeps the length-based output checks meaningful.

use folio_core::defaults;

/// Closing quotes accepted after a sentence terminator.
const CLOSING_QUOTES: &[char] = &['"', '\'', '\u{201d}', '\u{2019}', '\u{00bb}', ')'];

/// Splits chapter text into chunks of at most `max_size` bytes.
///
/// The boundary search is restricted to a fixed trailing window before the
/// target end, keeping segmentation O(n) over the input. Cut priority:
/// blank-line paragraph break, sentence terminator followed by whitespace
/// or a closing quote, any line break, a word space, and as a last resort
/// a hard cut at the size limit. Every cut lands on a `char` boundary.
///
/// Invariant: concatenating the returned chunks reproduces the input
/// exactly — nothing dropped, nothing reordered.
#[derive(Debug, Clone)]
pub struct Segmenter {
    max_size: usize,
    window: usize,
}

impl Segmenter {
    /// Create a segmenter with the given maximum chunk size in bytes.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            window: defaults::BOUNDARY_WINDOW.min(max_size),
        }
    }

    /// Override the trailing boundary-search window.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.clamp(1, self.max_size);
        self
    }

    /// Split `text` into ordered chunks.
    pub fn segment(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.max_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            if rest.len() <= self.max_size {
                chunks.push(rest.to_string());
                break;
            }
            let cut = self.split_point(rest);
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        chunks
    }

    /// Best cut position in `text`, which must be longer than `max_size`.
    fn split_point(&self, text: &str) -> usize {
        let limit = floor_char_boundary(text, self.max_size);
        if limit == 0 {
            // max_size smaller than the first char; emit that char whole.
            return text.chars().next().map(char::len_utf8).unwrap_or(text.len());
        }

        let window_start = floor_char_boundary(text, limit.saturating_sub(self.window));
        let hay = &text[window_start..limit];

        if let Some(pos) = hay.rfind("\n\n") {
            let cut = window_start + pos + 2;
            if cut > 0 && cut < text.len() {
                return cut;
            }
        }
        if let Some(pos) = sentence_cut(hay) {
            let cut = window_start + pos;
            if cut > 0 && cut < text.len() {
                return cut;
            }
        }
        if let Some(pos) = hay.rfind('\n') {
            let cut = window_start + pos + 1;
            if cut > 0 && cut < text.len() {
                return cut;
            }
        }
        if let Some(pos) = hay.rfind(' ') {
            let cut = window_start + pos + 1;
            if cut > 0 && cut < text.len() {
                return cut;
            }
        }
        limit
    }

    /// Split `text` near its midpoint at the best available boundary.
    ///
    /// Used by bisection retry: both halves together reproduce the input
    /// exactly.
    pub fn bisect(text: &str) -> (&str, &str) {
        if text.len() < 2 {
            return (text, "");
        }
        let half = Segmenter::new(text.len() / 2);
        let cut = half.split_point(text);
        if cut == 0 || cut >= text.len() {
            let mid = floor_char_boundary(text, text.len() / 2);
            let mid = if mid == 0 {
                text.chars().next().map(char::len_utf8).unwrap_or(text.len())
            } else {
                mid
            };
            return text.split_at(mid);
        }
        text.split_at(cut)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(defaults::CHUNK_SIZE)
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Position after the last sentence terminator (plus its trailing
/// whitespace or closing quote) in `hay`, if any.
fn sentence_cut(hay: &str) -> Option<usize> {
    let mut best = None;
    let mut iter = hay.char_indices().peekable();
    while let Some((_, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(j, next)) = iter.peek() {
                if next.is_whitespace() || CLOSING_QUOTES.contains(&next) {
                    best = Some(j + next.len_utf8());
                }
            }
        }
    }
    best
}
