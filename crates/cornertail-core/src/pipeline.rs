//! Text pipeline for process output.
//!
//! Turns raw, possibly ANSI-colored output chunks into a bounded tail of
//! fixed-width rendered lines. Every chunk handed to [`OutputBuffer::ingest`]
//! goes through the same steps:
//!
//! 1. strip `ESC [ <params> m|K` sequences
//! 2. expand tabs to three spaces
//! 3. normalize `\r\n` and lone `\r` to `\n`
//! 4. prefix the chunk with `[tag] ` when tagged
//! 5. greedy word-wrap of each line to `char_limit` characters
//! 6. append, then keep only the last `max_lines` lines
//!
//! Lengths are counted in `char`s, never bytes.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum characters per rendered line.
pub const DEFAULT_CHAR_LIMIT: usize = 30;

/// Number of rendered lines kept in the tail window.
pub const DEFAULT_MAX_LINES: usize = 20;

/// Replacement for a single tab character.
const TAB_EXPANSION: &str = "   ";

/// CSI sequences ending in `m` (SGR) or `K` (erase in line).
static ANSI_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[mK]").expect("ANSI pattern is valid"));

/// Wrap width and tail size for an [`OutputBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapConfig {
    pub char_limit: usize,
    pub max_lines: usize,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            char_limit: DEFAULT_CHAR_LIMIT,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl WrapConfig {
    /// Creates a config. Both values are clamped to at least 1.
    pub fn new(char_limit: usize, max_lines: usize) -> Self {
        Self {
            char_limit: char_limit.max(1),
            max_lines: max_lines.max(1),
        }
    }

    /// Default wrap width with a custom tail size.
    pub fn with_max_lines(max_lines: usize) -> Self {
        Self::new(DEFAULT_CHAR_LIMIT, max_lines)
    }
}

/// Removes ANSI color and erase-in-line sequences.
///
/// Runs to a fixed point so that removing one sequence cannot splice the
/// remaining bytes into a new one; stripping twice is the same as once.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }

    let mut current = Cow::Borrowed(s);
    while ANSI_SEQUENCE.is_match(&current) {
        let next = ANSI_SEQUENCE.replace_all(&current, "").into_owned();
        current = Cow::Owned(next);
    }
    current
}

/// Strips ANSI sequences, expands tabs and normalizes line endings.
pub fn normalize(s: &str) -> String {
    strip_ansi(s)
        .replace('\t', TAB_EXPANSION)
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

/// Greedy word-wrap of a single line (no `\n` inside).
///
/// While the remainder is longer than `char_limit`, breaks at the last space
/// within the first `char_limit + 1` characters if that space sits at or past
/// `char_limit / 2`; the space itself is dropped. Otherwise the remainder is
/// hard-cut at exactly `char_limit` characters. An empty line yields one empty
/// rendered line.
pub fn wrap_line(line: &str, char_limit: usize) -> Vec<String> {
    let char_limit = char_limit.max(1);
    let chars: Vec<char> = line.chars().collect();
    let mut rest = chars.as_slice();
    let mut rendered = Vec::new();

    while rest.len() > char_limit {
        let window = &rest[..=char_limit];
        match window.iter().rposition(|&c| c == ' ') {
            Some(space) if space >= char_limit / 2 => {
                rendered.push(rest[..space].iter().collect());
                rest = &rest[space + 1..];
            }
            _ => {
                rendered.push(rest[..char_limit].iter().collect());
                rest = &rest[char_limit..];
            }
        }
    }

    rendered.push(rest.iter().collect());
    rendered
}

/// Bounded tail of rendered output lines.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    config: WrapConfig,
    lines: VecDeque<String>,
}

impl OutputBuffer {
    pub fn new(config: WrapConfig) -> Self {
        Self {
            config,
            lines: VecDeque::with_capacity(config.max_lines),
        }
    }

    pub fn config(&self) -> WrapConfig {
        self.config
    }

    /// Processes one chunk of output and appends the rendered lines.
    ///
    /// `tag` (e.g. `"ERROR"` for stderr) is prefixed once to the whole chunk,
    /// not to every line. Never fails.
    pub fn ingest(&mut self, raw: &str, tag: Option<&str>) {
        let mut text = normalize(raw);
        if let Some(tag) = tag {
            text = format!("[{tag}] {text}");
        }

        for line in text.split('\n') {
            self.lines.extend(wrap_line(line, self.config.char_limit));
        }

        let overflow = self.lines.len().saturating_sub(self.config.max_lines);
        self.lines.drain(..overflow);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Copies the current lines for rendering.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(char_limit: usize, max_lines: usize) -> OutputBuffer {
        OutputBuffer::new(WrapConfig::new(char_limit, max_lines))
    }

    /// Deterministic pseudo-random text with spaces, newlines and escapes.
    fn noisy_chunks(seed: u64, count: usize) -> Vec<String> {
        const PIECES: &[&str] = &[
            "word", " ", "  ", "\n", "\r\n", "\r", "\t", "\x1b[31m", "\x1b[0m", "\x1b[2K",
            "supercalifragilisticexpialidocious", "é", "日本語", "x", "",
        ];
        let mut state = seed;
        (0..count)
            .map(|_| {
                let mut chunk = String::new();
                for _ in 0..12 {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    chunk.push_str(PIECES[(state >> 33) as usize % PIECES.len()]);
                }
                chunk
            })
            .collect()
    }

    #[test]
    fn test_wrap_breaks_at_spaces() {
        let mut buf = buffer(10, 3);
        buf.ingest("hello world foo bar", None);
        assert_eq!(buf.snapshot(), vec!["hello", "world foo", "bar"]);
    }

    #[test]
    fn test_strip_ansi_colors() {
        let mut buf = buffer(30, 20);
        buf.ingest("\x1b[31mRED\x1b[0m", None);
        assert_eq!(buf.snapshot(), vec!["RED"]);
        assert!(buf.lines().all(|line| !line.contains('\x1b')));
    }

    #[test]
    fn test_tail_keeps_last_lines_in_order() {
        let mut buf = buffer(30, 20);
        let letters: Vec<String> = ('a'..='y').map(String::from).collect();
        assert_eq!(letters.len(), 25);
        buf.ingest(&letters.join("\n"), None);
        assert_eq!(buf.len(), 20);
        assert_eq!(buf.snapshot(), letters[5..].to_vec());
    }

    #[test]
    fn test_tail_across_many_ingests() {
        let mut buf = buffer(30, 20);
        for i in 0..25 {
            buf.ingest(&i.to_string(), None);
        }
        let expected: Vec<String> = (5..25).map(|i| i.to_string()).collect();
        assert_eq!(buf.snapshot(), expected);
    }

    #[test]
    fn test_exit_notice_is_last_line() {
        let mut buf = buffer(40, 20);
        buf.ingest("some output", None);
        buf.ingest("\n[Process finished: exit code 1]", None);
        assert_eq!(
            buf.snapshot(),
            vec!["some output", "", "[Process finished: exit code 1]"]
        );
    }

    #[test]
    fn test_exit_notice_wraps_at_default_width() {
        let mut buf = OutputBuffer::new(WrapConfig::default());
        buf.ingest("\n[Process finished: exit code 1]", None);
        assert_eq!(
            buf.snapshot(),
            vec!["", "[Process finished: exit code", "1]"]
        );
        assert_eq!(
            buf.snapshot()[1..].join(" "),
            "[Process finished: exit code 1]"
        );
    }

    #[test]
    fn test_long_token_is_hard_cut() {
        let token = "abcdefghij".repeat(5);
        let lines = wrap_line(&token, 10);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| line == "abcdefghij"));
        assert_eq!(lines.concat(), token);
    }

    #[test]
    fn test_space_before_half_limit_is_not_used() {
        // Only space is at index 2, below 10 / 2.
        let lines = wrap_line("ab cdefghijklmnop", 10);
        assert_eq!(lines, vec!["ab cdefghi", "jklmnop"]);
    }

    #[test]
    fn test_space_exactly_at_limit() {
        let lines = wrap_line("abcdefghij klm", 10);
        assert_eq!(lines, vec!["abcdefghij", "klm"]);
    }

    #[test]
    fn test_empty_line_renders_empty() {
        assert_eq!(wrap_line("", 10), vec![String::new()]);
        let mut buf = buffer(10, 5);
        buf.ingest("a\n\nb", None);
        assert_eq!(buf.snapshot(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_trailing_newline_yields_empty_line() {
        let mut buf = buffer(10, 5);
        buf.ingest("line\n", None);
        assert_eq!(buf.snapshot(), vec!["line", ""]);
    }

    #[test]
    fn test_tag_prefixes_chunk_once() {
        let mut buf = buffer(30, 5);
        buf.ingest("first\nsecond", Some("ERROR"));
        assert_eq!(buf.snapshot(), vec!["[ERROR] first", "second"]);
    }

    #[test]
    fn test_tabs_expand_to_three_spaces() {
        assert_eq!(normalize("a\tb"), "a   b");
    }

    #[test]
    fn test_line_endings_normalized() {
        assert_eq!(normalize("a\r\nb\rc\n"), "a\nb\nc\n");
        let mut buf = buffer(10, 5);
        buf.ingest("a\r\nb\rc", None);
        assert_eq!(buf.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_erase_in_line_stripped() {
        assert_eq!(strip_ansi("progress\x1b[K 50%"), "progress 50%");
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[m"), "ok");
    }

    #[test]
    fn test_other_escapes_left_alone() {
        // Cursor movement is not part of the stripped set.
        assert_eq!(strip_ansi("\x1b[2Jx"), "\x1b[2Jx");
    }

    #[test]
    fn test_strip_ansi_borrows_clean_input() {
        assert!(matches!(strip_ansi("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_ansi_idempotent() {
        let spliced = "\x1b[\x1b[0m31mred";
        let once = strip_ansi(spliced).into_owned();
        assert_eq!(once, "red");
        assert_eq!(strip_ansi(&once), once);

        for chunk in noisy_chunks(7, 200) {
            let once = strip_ansi(&chunk).into_owned();
            assert_eq!(strip_ansi(&once), once);
        }
    }

    #[test]
    fn test_round_trip_space_separated_words() {
        let line = "the quick brown fox jumps over the lazy dog again and again";
        let lines = wrap_line(line, 12);
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(lines.join(" "), line);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let lines = wrap_line("ééééé", 5);
        assert_eq!(lines, vec!["ééééé"]);
        let lines = wrap_line("日本語日本語", 4);
        assert_eq!(lines, vec!["日本語日", "本語"]);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = WrapConfig::new(0, 0);
        assert_eq!(config.char_limit, 1);
        assert_eq!(config.max_lines, 1);
        let mut buf = OutputBuffer::new(config);
        buf.ingest("abc", None);
        assert_eq!(buf.snapshot(), vec!["c"]);
    }

    #[test]
    fn test_invariants_hold_for_noisy_input() {
        for (char_limit, max_lines) in [(1, 1), (5, 3), (10, 20), (30, 20)] {
            let mut buf = buffer(char_limit, max_lines);
            for (i, chunk) in noisy_chunks(char_limit as u64, 100).iter().enumerate() {
                let tag = (i % 3 == 0).then_some("ERROR");
                buf.ingest(chunk, tag);
                assert!(buf.len() <= max_lines);
                for line in buf.lines() {
                    assert!(line.chars().count() <= char_limit, "{line:?}");
                    assert!(!line.contains('\n'));
                    assert!(!line.contains('\r'));
                    assert!(!line.contains('\t'));
                }
            }
        }
    }
}
