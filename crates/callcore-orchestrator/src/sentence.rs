//! Sentence-boundary splitting for streamed LLM output (§4.3.1, §4.3.2).
//!
//! Strong boundaries (`.!?`) and weak boundaries (`,—;`) both followed by
//! whitespace complete a sentence; anything left in the buffer at stream end
//! is flushed as the final sentence. Every completed sentence is emitted
//! exactly once, in order — this is what the "double speak" defect class
//! (§4.3.2) guards against.

use regex::Regex;
use std::sync::OnceLock;

fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[.!?,—;]\s"#).unwrap())
}

/// Accumulates streamed text deltas and yields completed sentences as soon
/// as a boundary is seen, keeping the incomplete tail buffered.
#[derive(Default)]
pub struct SentenceSplitter {
    buffer: String,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text delta; returns any newly completed sentences, in order.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        let mut out = Vec::new();

        loop {
            let Some(m) = boundary_re().find(&self.buffer) else {
                break;
            };
            let split_at = m.end();
            let sentence = self.buffer[..split_at].trim().to_string();
            self.buffer.drain(..split_at);
            if !sentence.is_empty() {
                out.push(sentence);
            }
        }

        out
    }

    /// Call once the stream has ended; flushes any trailing fragment as the
    /// final sentence (§4.3.2).
    pub fn finish(mut self) -> Option<String> {
        let tail = self.buffer.trim().to_string();
        self.buffer.clear();
        if tail.is_empty() {
            None
        } else {
            Some(tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_strong_boundary() {
        let mut s = SentenceSplitter::new();
        let out = s.push("Hello there. How are you");
        assert_eq!(out, vec!["Hello there."]);
        let tail = s.finish().unwrap();
        assert_eq!(tail, "How are you");
    }

    #[test]
    fn splits_across_multiple_pushes() {
        let mut s = SentenceSplitter::new();
        assert!(s.push("Hello wor").is_empty());
        let out = s.push("ld. Next sentence here.");
        assert_eq!(out, vec!["Hello world.", "Next sentence here."]);
        assert!(s.finish().is_none());
    }

    #[test]
    fn weak_boundary_also_splits() {
        let mut s = SentenceSplitter::new();
        let out = s.push("First clause, second clause.");
        assert_eq!(out, vec!["First clause,", "second clause."]);
    }

    #[test]
    fn no_boundary_without_trailing_whitespace() {
        let mut s = SentenceSplitter::new();
        assert!(s.push("3.14 is pi").is_empty());
        assert_eq!(s.finish().unwrap(), "3.14 is pi");
    }
}
