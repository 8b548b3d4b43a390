/// Reduces a token to its core tag by stripping emphasis brackets and weights.
///
/// - `(masterpiece:1.2)` -> `masterpiece`
/// - `((best quality))` -> `best quality`
/// - `[lowres]` -> `lowres`
/// - `<lora:name:0.8>` -> `<lora:name:0.8>` (resource references are opaque)
///
/// Each pass removes the whole run of leading openers and trailing closers,
/// so unbalanced emphasis such as `(a:1.2))` still reduces. Adjacent groups
/// like `(a)(b)` are returned unchanged. Case is preserved.
pub fn extract_core(token: &str) -> String {
    let mut core = token.trim();

    if core.starts_with('<') && core.ends_with('>') {
        return core.to_string();
    }

    // Every successful pass removes at least two bytes.
    let max_passes = core.len() / 2 + 1;
    for _ in 0..max_passes {
        match strip_outer_emphasis(core) {
            Some(inner) => core = inner,
            None => break,
        }
    }

    core.to_string()
}

/// One reduction step: `((inner:weight)` or `[inner]]` -> `inner`.
fn strip_outer_emphasis(token: &str) -> Option<&str> {
    if token.contains('\n') || has_adjacent_groups(token) {
        return None;
    }

    let bytes = token.as_bytes();
    let lead = bytes.iter().take_while(|b| matches!(b, b'(' | b'[')).count();
    let trail = bytes
        .iter()
        .rev()
        .take_while(|b| matches!(b, b')' | b']'))
        .count();
    if lead == 0 || trail == 0 {
        return None;
    }

    let close_start = token.len() - trail;
    let inner = if lead < close_start {
        strip_weight(&token[lead..close_start])
    } else if trail >= 2 {
        // Brackets only: the first closer is taken as the content.
        &token[lead..lead + 1]
    } else if lead >= 2 {
        &token[lead - 1..lead]
    } else {
        return None;
    };

    Some(inner.trim())
}

/// True when a bracket group closes back to depth zero and another group
/// opens after it, as in `(a)(b)`. Round and square brackets count together.
fn has_adjacent_groups(token: &str) -> bool {
    let mut depth = 0usize;
    let mut closed = false;

    for ch in token.chars() {
        match ch {
            '(' | '[' => {
                if closed {
                    return true;
                }
                depth += 1;
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    closed = true;
                }
            }
            _ => {}
        }
    }

    false
}

/// Drops a trailing `:1.2` style weight, keeping the text before it.
fn strip_weight(inner: &str) -> &str {
    let Some((name, weight)) = inner.rsplit_once(':') else {
        return inner;
    };
    let weight = weight.trim_start();
    let is_weight = !weight.is_empty() && weight.chars().all(|c| c.is_ascii_digit() || c == '.');
    if is_weight && !name.is_empty() {
        name
    } else {
        inner
    }
}
