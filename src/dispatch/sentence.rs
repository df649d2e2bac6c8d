/// Characters that close a sentence
pub const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '\n'];

/// Incremental sentence segmentation over a stream of text fragments
#[derive(Debug, Default, Clone)]
pub struct SentenceSplitter {
    buffer: String,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every sentence it completed, trimmed, in order
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        let mut sentences = Vec::new();
        let mut start = 0;

        for (i, ch) in self.buffer.char_indices() {
            if SENTENCE_TERMINATORS.contains(&ch) {
                let end = i + ch.len_utf8();
                let sentence = self.buffer[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }

        self.buffer.drain(..start);
        sentences
    }

    /// Text still waiting for a terminator
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Take whatever is left as a final sentence
    pub fn finish(&mut self) -> Option<String> {
        let residual = self.buffer.trim().to_string();
        self.buffer.clear();
        (!residual.is_empty()).then_some(residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences_across_fragments() {
        let mut splitter = SentenceSplitter::new();

        assert!(splitter.push("Xin ").is_empty());
        assert_eq!(splitter.push("chào! Hôm nay "), vec!["Xin chào!"]);
        assert_eq!(splitter.push("đẹp trời.\n"), vec!["Hôm nay đẹp trời."]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_multiple_sentences_in_one_fragment() {
        let mut splitter = SentenceSplitter::new();

        let sentences = splitter.push("Một. Hai? Ba! Bốn");
        assert_eq!(sentences, vec!["Một.", "Hai?", "Ba!"]);
        assert_eq!(splitter.pending(), " Bốn");
        assert_eq!(splitter.finish(), Some("Bốn".to_string()));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut splitter = SentenceSplitter::new();

        assert_eq!(splitter.push("\n\n  \nXong.\n"), vec!["Xong."]);
        assert_eq!(splitter.finish(), None);
    }
}
