/// Nesting depth for the three bracket kinds that can hide a separator.
#[derive(Debug, Default, Clone, Copy)]
struct Depth {
    round: usize,
    square: usize,
    angle: usize,
}

impl Depth {
    fn is_top_level(&self) -> bool {
        self.round == 0 && self.square == 0 && self.angle == 0
    }

    /// Updates the counters for `ch`. Closers never go below zero, so stray
    /// `)` or `]` are kept as plain text.
    fn track(&mut self, ch: char) {
        match ch {
            '(' => self.round += 1,
            ')' => self.round = self.round.saturating_sub(1),
            '[' => self.square += 1,
            ']' => self.square = self.square.saturating_sub(1),
            '<' => self.angle += 1,
            '>' => self.angle = self.angle.saturating_sub(1),
            _ => {}
        }
    }
}

/// Splits a prompt into top-level tokens.
///
/// Commas and newlines separate tokens only outside `()`, `[]` and `<>`:
///
/// `masterpiece, (tag1, tag2:1.3), <lora:name:0.8>`
/// -> `["masterpiece", "(tag1, tag2:1.3)", "<lora:name:0.8>"]`
///
/// Tokens are trimmed and empty tokens are dropped.
pub fn tokenize(prompt: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut depth = Depth::default();
    let mut start = 0usize;

    for (idx, ch) in prompt.char_indices() {
        if matches!(ch, ',' | '\n') && depth.is_top_level() {
            push_token(&mut tokens, &prompt[start..idx]);
            start = idx + ch.len_utf8();
            continue;
        }
        depth.track(ch);
    }
    push_token(&mut tokens, &prompt[start..]);

    tokens
}

fn push_token(tokens: &mut Vec<String>, segment: &str) {
    let token = segment.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
}

/// Joins tokens back into the canonical `", "` separated prompt form.
pub fn tokens_to_prompt<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commas_inside_brackets_do_not_split() {
        assert_eq!(
            tokenize("masterpiece, (tag1, tag2:1.3), <lora:name:0.8>"),
            vec!["masterpiece", "(tag1, tag2:1.3)", "<lora:name:0.8>"]
        );
        assert_eq!(
            tokenize("[a, b], [[c, d]], e"),
            vec!["[a, b]", "[[c, d]]", "e"]
        );
    }

    #[test]
    fn test_newlines_split_like_commas() {
        assert_eq!(
            tokenize("1girl\nsolo, smile\n\nlooking at viewer"),
            vec!["1girl", "solo", "smile", "looking at viewer"]
        );
    }

    #[test]
    fn test_newline_inside_brackets_is_content() {
        assert_eq!(tokenize("(a,\nb), c"), vec!["(a,\nb)", "c"]);
    }

    #[test]
    fn test_empty_tokens_are_dropped() {
        assert_eq!(tokenize(" , ,a,, b ,\n,"), vec!["a", "b"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ,\n , ").is_empty());
    }

    #[test]
    fn test_internal_whitespace_is_preserved() {
        assert_eq!(tokenize("  best   quality ,x"), vec!["best   quality", "x"]);
    }

    #[test]
    fn test_unbalanced_closers_are_tolerated() {
        assert_eq!(tokenize("a), b], c>, d"), vec!["a)", "b]", "c>", "d"]);
    }

    #[test]
    fn test_unclosed_opener_swallows_rest() {
        assert_eq!(tokenize("a, (b, c, d"), vec!["a", "(b, c, d"]);
    }

    #[test]
    fn test_bracket_kinds_are_independent() {
        // `]` does not close `(`, so the comma stays inside the token.
        assert_eq!(tokenize("(a], b), c"), vec!["(a], b)", "c"]);
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(tokenize("猫耳, (笑顔:1.2),ü"), vec!["猫耳", "(笑顔:1.2)", "ü"]);
    }

    #[test]
    fn test_tokens_to_prompt_joins_with_comma_space() {
        assert_eq!(tokens_to_prompt(&["a", "(b, c)", "d"]), "a, (b, c), d");
        assert_eq!(tokens_to_prompt::<&str>(&[]), "");
    }

    #[test]
    fn test_retokenizing_is_stable() {
        let prompts = [
            "a,b\nc",
            "  x , (y,\nz) ,, <lora:q:1>\n",
            "a), (b, [c, d]",
            "",
        ];
        for prompt in prompts {
            let once = tokenize(prompt);
            let twice = tokenize(&tokens_to_prompt(&once));
            assert_eq!(once, twice, "unstable for {:?}", prompt);
        }
    }
}
