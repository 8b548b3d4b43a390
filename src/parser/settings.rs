//! Key-value scanner for the trailing settings line of an infotext blob.
//!
//! `Steps: 20, Sampler: Euler a, Lora hashes: "a: 1, b: 2", Size: 512x768`
//!
//! The scanner alternates between two states. KEY looks for a word character
//! followed by key characters (word, space, `-`, `/`) and a colon; a failed
//! attempt moves one character forward and retries. VALUE reads either a
//! double-quoted string with backslash escapes or a plain run up to the next
//! comma, then consumes that comma.

/// Minimum number of pairs for a line to count as a settings line.
pub const MIN_SETTINGS_PAIRS: usize = 3;

/// One raw `key: value` match. Quoted values are still quoted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPair<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[derive(Clone, Copy)]
enum State {
    Key,
    Value { key_start: usize, key_end: usize },
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_key_char(ch: char) -> bool {
    is_word_char(ch) || matches!(ch, ' ' | '-' | '/')
}

/// Scans every `key: value` pair of `line`, in order.
pub fn scan_pairs(line: &str) -> Vec<RawPair<'_>> {
    let mut pairs = Vec::new();
    let mut pos = 0usize;
    let mut state = State::Key;

    while pos < line.len() {
        match state {
            State::Key => match match_key(line, pos) {
                Some((key_start, key_end)) => {
                    state = State::Value { key_start, key_end };
                    // Skip the colon.
                    pos = key_end + 1;
                }
                None => pos += next_char_len(line, pos),
            },
            State::Value { key_start, key_end } => {
                let (value_start, value_end, next) = match_value(line, pos);
                pairs.push(RawPair {
                    key: &line[key_start..key_end],
                    value: &line[value_start..value_end],
                });
                state = State::Key;
                pos = next;
            }
        }
    }

    // A key right at the end of the line still has an (empty) value.
    if let State::Value { key_start, key_end } = state {
        pairs.push(RawPair {
            key: &line[key_start..key_end],
            value: "",
        });
    }

    pairs
}

fn next_char_len(line: &str, pos: usize) -> usize {
    line[pos..].chars().next().map_or(1, char::len_utf8)
}

/// Matches a key starting at `pos`. Returns the key span; the colon sits at
/// the end of the span.
fn match_key(line: &str, pos: usize) -> Option<(usize, usize)> {
    let rest = &line[pos..];
    let key_start = pos + (rest.len() - rest.trim_start().len());

    let mut chars = line[key_start..].char_indices();
    let (_, first) = chars.next()?;
    if !is_word_char(first) {
        return None;
    }

    let mut key_len = first.len_utf8();
    let mut body_len = 0usize;
    for (offset, ch) in chars {
        if ch == ':' {
            break;
        }
        if !is_key_char(ch) {
            return None;
        }
        body_len += 1;
        key_len = offset + ch.len_utf8();
    }

    let key_end = key_start + key_len;
    let colon_follows = line[key_end..].starts_with(':');
    if body_len > 0 && colon_follows {
        Some((key_start, key_end))
    } else {
        None
    }
}

/// Matches a value starting at `pos`. Returns the value span and the position
/// after the value and its trailing comma.
fn match_value(line: &str, pos: usize) -> (usize, usize, usize) {
    let rest = &line[pos..];
    let value_start = pos + (rest.len() - rest.trim_start().len());

    if let Some(quoted_end) = match_quoted(line, value_start) {
        let after = &line[quoted_end..];
        if after.is_empty() {
            return (value_start, quoted_end, quoted_end);
        }
        if after.starts_with(',') {
            return (value_start, quoted_end, quoted_end + 1);
        }
    }

    match line[value_start..].find(',') {
        Some(offset) => {
            let value_end = value_start + offset;
            (value_start, value_end, value_end + 1)
        }
        None => (value_start, line.len(), line.len()),
    }
}

/// Matches `"..."` with backslash escapes at `start`, returning the position
/// after the closing quote. Empty quotes do not match.
fn match_quoted(line: &str, start: usize) -> Option<usize> {
    let body = line[start..].strip_prefix('"')?;
    let mut chars = body.char_indices();
    let mut consumed = 0usize;

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next()?;
                consumed += 1;
            }
            '"' => {
                return if consumed > 0 {
                    Some(start + 1 + offset + 1)
                } else {
                    None
                };
            }
            _ => consumed += 1,
        }
    }

    None
}

/// Removes the surrounding quotes of a quoted value and unescapes `\"` and
/// `\\`. Unquoted values are returned as is.
pub fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'));
    match inner {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}

/// Splits an exact `<digits>x<digits>` value into its two numbers.
pub fn split_dimensions(value: &str) -> Option<(&str, &str)> {
    let (width, height) = value.split_once('x')?;
    let is_number = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if is_number(width) && is_number(height) {
        Some((width, height))
    } else {
        None
    }
}

/// Number of `key: value` pairs on `line`.
pub fn count_pairs(line: &str) -> usize {
    scan_pairs(line).len()
}

/// Whether `line` carries enough pairs to be treated as a settings line.
pub fn is_settings_line(line: &str) -> bool {
    count_pairs(line) >= MIN_SETTINGS_PAIRS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(line: &str) -> Vec<(&str, &str)> {
        scan_pairs(line)
            .into_iter()
            .map(|pair| (pair.key, pair.value))
            .collect()
    }

    #[test]
    fn test_scans_plain_pairs() {
        assert_eq!(
            pairs("Steps: 20, Sampler: Euler a, CFG scale: 7, Size: 512x768, Seed: 123"),
            vec![
                ("Steps", "20"),
                ("Sampler", "Euler a"),
                ("CFG scale", "7"),
                ("Size", "512x768"),
                ("Seed", "123"),
            ]
        );
    }

    #[test]
    fn test_quoted_value_keeps_commas() {
        assert_eq!(
            pairs(r#"Steps: 20, Lora hashes: "foo: 111, bar: 222", Seed: 42"#),
            vec![
                ("Steps", "20"),
                ("Lora hashes", r#""foo: 111, bar: 222""#),
                ("Seed", "42"),
            ]
        );
    }

    #[test]
    fn test_quoted_value_with_escapes() {
        assert_eq!(
            pairs(r#"Prompt: "say \"hi\", ok", Steps: 3"#),
            vec![("Prompt", r#""say \"hi\", ok""#), ("Steps", "3")]
        );
    }

    #[test]
    fn test_quote_not_followed_by_comma_falls_back_to_plain() {
        assert_eq!(
            pairs(r#"Note: "a" b, Steps: 3"#),
            vec![("Note", r#""a" b"#), ("Steps", "3")]
        );
    }

    #[test]
    fn test_unquoted_commas_split_values() {
        // `eyes` and `smile` have no colon, so they are skipped.
        assert_eq!(
            pairs("ADetailer prompt: face, eyes, smile, CFG scale: 7"),
            vec![("ADetailer prompt", "face"), ("CFG scale", "7")]
        );
    }

    #[test]
    fn test_key_characters() {
        assert_eq!(
            pairs("Hires resize-1: 0, Model/VAE: x, Emphasis (new): y, Module 1: z"),
            vec![("Hires resize-1", "0"), ("Model/VAE", "x"), ("Module 1", "z")]
        );
    }

    #[test]
    fn test_key_may_start_mid_text() {
        assert_eq!(pairs("(Steps: 20"), vec![("Steps", "20")]);
        assert_eq!(pairs("foo.bar: 1"), vec![("bar", "1")]);
    }

    #[test]
    fn test_single_character_key_is_not_a_key() {
        assert!(pairs("a: b").is_empty());
        assert_eq!(pairs("ab: c"), vec![("ab", "c")]);
    }

    #[test]
    fn test_value_may_be_empty() {
        assert_eq!(pairs("Steps:, Seed: 1"), vec![("Steps", ""), ("Seed", "1")]);
        assert_eq!(pairs("Steps:"), vec![("Steps", "")]);
    }

    #[test]
    fn test_prompt_text_is_not_a_settings_line() {
        // Weighted emphasis looks like a pair, but one is not enough.
        assert_eq!(count_pairs("masterpiece, (best quality:1.2), 1girl"), 1);
        assert!(!is_settings_line("masterpiece, (best quality:1.2), 1girl"));
        assert!(!is_settings_line("Steps: 20, Sampler: Euler"));
        assert!(is_settings_line("Steps: 20, Sampler: Euler, Seed: 1"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""a, b""#), "a, b");
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#""C:\\models""#), r"C:\models");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_split_dimensions() {
        assert_eq!(split_dimensions("512x768"), Some(("512", "768")));
        assert_eq!(split_dimensions("512 x 768"), None);
        assert_eq!(split_dimensions("x768"), None);
        assert_eq!(split_dimensions("1.5x2"), None);
    }
}
