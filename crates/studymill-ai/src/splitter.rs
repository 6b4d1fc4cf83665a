/// Character-based text splitter with overlap.
///
/// Chunks are cut preferentially at paragraph, line, sentence, or word
/// boundaries inside the size window; consecutive chunks overlap so context
/// is not lost at the seams.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        TextSplitter {
            chunk_size: 4000,
            chunk_overlap: 200,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_overlap = chunk_overlap.min(chunk_size / 2);
        TextSplitter {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Split `text` into chunks of at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let window_end = (start + self.chunk_size).min(chars.len());
            let end = if window_end == chars.len() {
                window_end
            } else {
                find_break(&chars, start, window_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let trimmed = chunk.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end == chars.len() {
                break;
            }
            // Step back by the overlap, but always make forward progress
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        chunks
    }
}

/// Find the best break position in `chars[start..end]`, scanning backwards.
/// Falls back to a hard cut at `end` when no boundary exists in the back
/// half of the window.
fn find_break(chars: &[char], start: usize, end: usize) -> usize {
    let floor = start + (end - start) / 2;

    // Boundary preference: blank line, newline, sentence end, whitespace
    let boundaries: [fn(&[char], usize) -> bool; 4] =
        [is_paragraph_break, is_line_break, is_sentence_break, is_word_break];
    for boundary in boundaries {
        for i in (floor..end).rev() {
            if boundary(chars, i) {
                return i + 1;
            }
        }
    }

    end
}

fn is_paragraph_break(chars: &[char], i: usize) -> bool {
    chars[i] == '\n' && i > 0 && chars[i - 1] == '\n'
}

fn is_line_break(chars: &[char], i: usize) -> bool {
    chars[i] == '\n'
}

fn is_sentence_break(chars: &[char], i: usize) -> bool {
    chars[i] == '.' && chars.get(i + 1).map_or(true, |c| c.is_whitespace())
}

fn is_word_break(chars: &[char], i: usize) -> bool {
    chars[i].is_whitespace()
}
