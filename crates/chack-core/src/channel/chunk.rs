//! Markdown-aware reply chunking.
//!
//! Chat platforms cap the size of a single message (Telegram 4096, Discord
//! 2000). Replies are split at line boundaries into fragments of at most
//! `limit` characters. When a split lands inside a fenced code block the
//! fragment gets a closing fence and the next one reopens the fence with the
//! same language tag, so every fragment renders on its own.
//!
//! Lengths are counted in `char`s, not bytes.

/// Split threshold used when a channel does not set its own.
pub const DEFAULT_MAX_LEN: usize = 4000;

const FENCE: &str = "```";
const CLOSE_FENCE: &str = "\n```";
const CLOSE_FENCE_LEN: usize = 4;

/// Split `text` into ordered fragments of at most `limit` characters.
///
/// Rules:
/// 1. Splits happen between lines; lines are kept whole when they fit.
/// 2. A line longer than a fresh fragment allows is cut into `limit`-sized
///    pieces. Fence markers are never cut; an over-long marker is reduced to
///    its bare form (fence plus language tag, or the fence alone).
/// 3. A split inside a fence closes it in the current fragment and reopens
///    it (with its language tag) in the next one.
/// 4. An unterminated fence is closed at the end of the last fragment.
/// 5. Blank fragments are never emitted. A run of blank lines that fits
///    neither neighbour is dropped, since platforms reject empty messages.
///
/// For text without fences, joining the fragments with `\n` gives back the
/// original unless a line had to be cut or a blank run was dropped.
pub fn chunk_markdown(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let limit = limit.max(1);
    if char_len(text) <= limit && !ends_inside_fence(text) {
        return vec![text.to_string()];
    }

    let mut chunker = Chunker::new(limit);
    for line in text.split('\n') {
        chunker.push_line(line);
    }
    chunker.finish()
}

struct Chunker {
    limit: usize,
    fragments: Vec<String>,
    current: String,
    current_len: usize,
    lines_in_current: usize,
    /// Byte offset where a trailing fence-opening line starts in `current`.
    /// `Some(0)` means the fragment holds nothing but the opener.
    opener_at: Option<usize>,
    in_fence: bool,
    /// Whether the open fence can be closed and reopened within `limit`.
    inject_fence: bool,
    lang: String,
}

impl Chunker {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            fragments: Vec::new(),
            current: String::new(),
            current_len: 0,
            lines_in_current: 0,
            opener_at: None,
            in_fence: false,
            inject_fence: false,
            lang: String::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        let marker = fence_marker(line).is_some();
        if marker && self.close_reopened_fence() {
            return;
        }

        let line_len = char_len(line);
        let (after_in_fence, after_inject, after_lang) = self.state_after(line);
        let reserve_after = if after_in_fence && after_inject {
            CLOSE_FENCE_LEN
        } else {
            0
        };

        if !self.fits(line_len, reserve_after) {
            self.flush(true);
            if marker && self.close_reopened_fence() {
                return;
            }
            if !self.fits(line_len, reserve_after) {
                if let Some(bare) = self.bare_marker(line) {
                    self.push_line(&bare);
                    return;
                }
                let reserve_before = if self.in_fence && self.inject_fence {
                    CLOSE_FENCE_LEN
                } else {
                    0
                };
                self.push_sliced(line, reserve_before.max(reserve_after));
                self.set_state(after_in_fence, after_inject, after_lang);
                return;
            }
        }

        let opens = marker && !self.in_fence && after_inject;
        let offset = self.current.len();
        self.append(line, line_len);
        if opens {
            self.opener_at = Some(offset);
        }
        self.set_state(after_in_fence, after_inject, after_lang);
    }

    /// Closing marker right after a reopened fence: drop both.
    fn close_reopened_fence(&mut self) -> bool {
        if !(self.in_fence && self.opener_at == Some(0)) {
            return false;
        }
        self.reset_current();
        self.set_state(false, false, String::new());
        true
    }

    /// Shortest form of a fence marker line that fits the current fragment.
    /// `None` for ordinary lines and when even a bare fence does not fit.
    fn bare_marker(&self, line: &str) -> Option<String> {
        let lang = fence_marker(line)?;
        [format!("{FENCE}{lang}"), FENCE.to_string()]
            .into_iter()
            .find(|candidate| {
                let (in_fence, inject, _) = self.state_after(candidate);
                let reserve = if in_fence && inject { CLOSE_FENCE_LEN } else { 0 };
                self.fits(char_len(candidate), reserve)
            })
    }

    fn fits(&self, line_len: usize, reserve: usize) -> bool {
        self.current_len + self.separator_len() + line_len + reserve <= self.limit
    }

    fn separator_len(&self) -> usize {
        usize::from(self.lines_in_current > 0)
    }

    fn append(&mut self, line: &str, line_len: usize) {
        if self.lines_in_current > 0 {
            self.current.push('\n');
            self.current_len += 1;
        }
        self.current.push_str(line);
        self.current_len += line_len;
        self.lines_in_current += 1;
        self.opener_at = None;
    }

    /// Cut an over-long line into pieces that each fit the fragment they land in.
    fn push_sliced(&mut self, line: &str, reserve: usize) {
        let mut rest: Vec<char> = line.chars().collect();
        while !rest.is_empty() {
            let used = self.current_len + self.separator_len() + reserve;
            let room = self.limit.saturating_sub(used);
            if room == 0 {
                if self.opener_at == Some(0) {
                    // A reopened fence leaves no room; cut the remainder unfenced.
                    self.reset_current();
                    self.inject_fence = false;
                } else {
                    self.flush(true);
                }
                continue;
            }
            let take = room.min(rest.len());
            let piece: String = rest.drain(..take).collect();
            self.append(&piece, take);
            if !rest.is_empty() {
                self.flush(true);
            }
        }
    }

    /// Emit the current fragment, closing an open fence, and optionally start
    /// the next fragment with a reopened fence.
    fn flush(&mut self, reopen: bool) {
        let stripped = match self.opener_at.take() {
            // A fence opened on the last line moves to the next fragment whole.
            Some(at) => {
                self.current.truncate(at);
                true
            }
            None => false,
        };

        let mut fragment = std::mem::take(&mut self.current);
        if !stripped && self.in_fence && self.inject_fence {
            fragment.push_str(CLOSE_FENCE);
        }
        self.emit(fragment);
        self.reset_current();

        if reopen && self.in_fence && self.inject_fence {
            self.current = format!("{FENCE}{}", self.lang);
            self.current_len = char_len(&self.current);
            self.lines_in_current = 1;
            self.opener_at = Some(0);
        }
    }

    fn reset_current(&mut self) {
        self.current.clear();
        self.current_len = 0;
        self.lines_in_current = 0;
        self.opener_at = None;
    }

    fn emit(&mut self, fragment: String) {
        if !fragment.trim().is_empty() {
            self.fragments.push(fragment);
        }
    }

    fn state_after(&self, line: &str) -> (bool, bool, String) {
        match fence_marker(line) {
            Some(_) if self.in_fence => (false, false, String::new()),
            Some(lang) => {
                let opener_len = FENCE.len() + char_len(lang);
                // Opener, one content char, and the closing fence must fit.
                let inject = opener_len + 2 + CLOSE_FENCE_LEN <= self.limit;
                (true, inject, lang.to_string())
            }
            None => (self.in_fence, self.inject_fence, self.lang.clone()),
        }
    }

    fn set_state(&mut self, in_fence: bool, inject: bool, lang: String) {
        self.in_fence = in_fence;
        self.inject_fence = inject;
        self.lang = lang;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush(false);
        self.fragments
    }
}

/// Language tag when `line` is a fence marker.
fn fence_marker(line: &str) -> Option<&str> {
    let after = line.trim_start().strip_prefix(FENCE)?;
    Some(after.split_whitespace().next().unwrap_or(""))
}

fn ends_inside_fence(text: &str) -> bool {
    text.split('\n')
        .filter(|line| fence_marker(line).is_some())
        .count()
        % 2
        == 1
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within(chunks: &[String], limit: usize) {
        for chunk in chunks {
            assert!(
                char_len(chunk) <= limit,
                "fragment exceeds {limit}: {} chars",
                char_len(chunk)
            );
        }
    }

    #[test]
    fn test_short_text_no_split() {
        let chunks = chunk_markdown("Hello, world!", 100);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_markdown("", 100).is_empty());
    }

    #[test]
    fn test_exact_limit() {
        let text = "a".repeat(100);
        let chunks = chunk_markdown(&text, 100);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_split_at_line_boundary_reconstructs() {
        let lines: Vec<String> = (0..40).map(|i| format!("line number {i}")).collect();
        let text = lines.join("\n");

        let chunks = chunk_markdown(&text, 60);

        assert!(chunks.len() > 1);
        assert_within(&chunks, 60);
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_code_block_preserved() {
        let text = "```rust\nfn main() {}\n```";
        let chunks = chunk_markdown(text, 100);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_code_block_spanning_chunks() {
        let code_lines: Vec<String> = (0..20).map(|i| format!("let x{i} = {i};")).collect();
        let text = format!("```rust\n{}\n```", code_lines.join("\n"));

        let chunks = chunk_markdown(&text, 80);

        assert!(chunks.len() >= 2, "Expected multiple chunks");
        assert_within(&chunks, 80);
        assert!(chunks[0].starts_with("```rust\n"));
        assert!(chunks[0].ends_with("\n```"), "first: {:?}", chunks[0]);
        for chunk in &chunks[1..] {
            assert!(chunk.starts_with("```rust\n"), "reopen: {chunk:?}");
            assert!(chunk.ends_with("```"), "close: {chunk:?}");
        }
    }

    #[test]
    fn test_stripping_fence_lines_reconstructs_content() {
        let code_lines: Vec<String> = (0..30).map(|i| format!("print({i})")).collect();
        let text = format!("Before\n```python\n{}\n```\nAfter", code_lines.join("\n"));

        let chunks = chunk_markdown(&text, 70);
        assert_within(&chunks, 70);

        let is_fence = |line: &&str| line.starts_with("```");
        let joined = chunks.join("\n");
        let rebuilt: Vec<&str> = joined.split('\n').filter(|l| !is_fence(l)).collect();
        let expected: Vec<&str> = text.split('\n').filter(|l| !is_fence(l)).collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn test_fence_opened_on_last_line_moves_to_next_fragment() {
        let text = format!("{}\n```rust\nfn main() {{}}\n```", "a".repeat(20));
        let chunks = chunk_markdown(&text, 32);

        assert_eq!(
            chunks,
            vec!["a".repeat(20), "```rust\nfn main() {}\n```".to_string()]
        );
    }

    #[test]
    fn test_unterminated_fence_is_closed() {
        let chunks = chunk_markdown("```sh\nls -la", 100);
        assert_eq!(chunks, vec!["```sh\nls -la\n```"]);
    }

    #[test]
    fn test_long_single_line() {
        let text = "x".repeat(250);
        let chunks = chunk_markdown(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_long_line_inside_fence() {
        let text = format!("```\n{}\n```", "y".repeat(120));
        let chunks = chunk_markdown(&text, 40);

        assert_within(&chunks, 40);
        for chunk in &chunks {
            assert!(chunk.starts_with("```"), "{chunk:?}");
            assert!(chunk.ends_with("```"), "{chunk:?}");
        }
        let ys: usize = chunks.iter().map(|c| c.matches('y').count()).sum();
        assert_eq!(ys, 120);
    }

    #[test]
    fn test_tiny_limit_never_exceeded() {
        let text = "```rust\nfn main() { println!(\"hi\"); }\n```";
        let chunks = chunk_markdown(text, 5);
        assert!(!chunks.is_empty());
        assert_within(&chunks, 5);
    }

    #[test]
    fn test_inline_backticks_not_treated_as_fence() {
        let text = "Use `code` inline and ``double`` too.\nMore text here.";
        assert_eq!(chunk_markdown(text, 200).len(), 1);
    }

    #[test]
    fn test_blank_run_with_no_room_is_dropped() {
        let text = format!("{}\n\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = chunk_markdown(&text, 10);
        assert_eq!(chunks, vec!["a".repeat(10), "b".repeat(10)]);
    }

    #[test]
    fn test_blank_lines_kept_when_next_fragment_has_room() {
        let text = format!("{}\n\n\n{}", "a".repeat(12), "b".repeat(5));
        let chunks = chunk_markdown(&text, 12);

        assert_eq!(chunks, vec!["a".repeat(12), format!("\n\n{}", "b".repeat(5))]);
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_long_fence_marker_is_never_cut() {
        let text = "```rust title=\"main.rs\"\nfn main() {}\n```";

        for limit in [3, 5, 8, 12, 16, 20] {
            let chunks = chunk_markdown(text, limit);
            assert_within(&chunks, limit);

            let mut content = String::new();
            for line in chunks.iter().flat_map(|c| c.split('\n')) {
                if line.starts_with('`') {
                    assert!(
                        line == "```" || line == "```rust",
                        "limit {limit}: cut marker {line:?}"
                    );
                } else {
                    content.push_str(line);
                }
            }
            assert_eq!(content, "fn main() {}", "limit {limit}");
        }
    }

    #[test]
    fn test_long_fence_marker_keeps_reopening() {
        let text = "```rust title=\"main.rs\"\nfn main() {}\n```";
        let chunks = chunk_markdown(text, 16);

        assert_eq!(
            chunks,
            vec![
                "```rust\nfn m\n```",
                "```rust\nain(\n```",
                "```rust\n) {}\n```",
            ]
        );
    }

    #[test]
    fn test_utf8_counts_chars_not_bytes() {
        let text = "这是一个包含中文字符的测试。".repeat(100);
        let chunks = chunk_markdown(&text, 500);

        assert_within(&chunks, 500);
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn test_telegram_sized_reply() {
        let paragraph = "word ".repeat(30);
        let text = vec![paragraph; 200].join("\n");
        let chunks = chunk_markdown(&text, 3500);
        assert_within(&chunks, 3500);
        assert_eq!(chunks.join("\n"), text);
    }
}
