use std::collections::HashSet;

use super::normalizer::extract_core;
use super::tokenizer::{tokenize, tokens_to_prompt};

fn folded_core(token: &str) -> String {
    extract_core(token).to_lowercase()
}

/// Case-folded core tags of a prompt, in order of first appearance.
pub fn core_tags(prompt: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(prompt)
        .iter()
        .map(|token| folded_core(token))
        .filter(|core| seen.insert(core.clone()))
        .collect()
}

/// Removes every token whose core tag matches one of `tags_to_remove`.
///
/// Matching ignores case and emphasis, so `b` removes `(B:1.2)`. Each removal
/// entry may itself hold several comma separated tags. An empty removal list
/// returns the prompt untouched, without re-joining its tokens.
pub fn remove_tags<S: AsRef<str>>(prompt: &str, tags_to_remove: &[S]) -> String {
    if tags_to_remove.is_empty() {
        return prompt.to_string();
    }

    let remove_cores: HashSet<String> = tags_to_remove
        .iter()
        .flat_map(|entry| tokenize(entry.as_ref()))
        .map(|token| folded_core(&token))
        .collect();

    let kept: Vec<String> = tokenize(prompt)
        .into_iter()
        .filter(|token| !remove_cores.contains(&folded_core(token)))
        .collect();
    tokens_to_prompt(&kept)
}

/// Appends `tags_to_add` verbatim after the prompt.
pub fn add_tags(prompt: &str, tags_to_add: &str) -> String {
    let addition = tags_to_add.trim();
    if addition.is_empty() {
        return prompt.to_string();
    }

    let base = prompt.trim();
    if base.is_empty() {
        addition.to_string()
    } else {
        format!("{base}, {addition}")
    }
}

/// Core tags present in every prompt.
///
/// Tags come back in first-prompt order and in the spelling the first prompt
/// uses, deduplicated ignoring case.
pub fn find_common_tags<S: AsRef<str>>(prompts: &[S]) -> Vec<String> {
    let Some((first, rest)) = prompts.split_first() else {
        return Vec::new();
    };

    let mut common: HashSet<String> = core_tags(first.as_ref()).into_iter().collect();
    for prompt in rest {
        let cores: HashSet<String> = core_tags(prompt.as_ref()).into_iter().collect();
        common.retain(|core| cores.contains(core));
        if common.is_empty() {
            return Vec::new();
        }
    }

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for token in tokenize(first.as_ref()) {
        let core = extract_core(&token);
        let folded = core.to_lowercase();
        if common.contains(&folded) && seen.insert(folded) {
            ordered.push(core);
        }
    }
    ordered
}

/// Applies a removal list and an addition to one prompt.
///
/// `remove` is split on commas into individual removal entries; `add` is
/// appended as is.
pub fn apply_edits(prompt: &str, remove: &str, add: &str) -> String {
    let remove_list: Vec<&str> = remove
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    let edited = remove_tags(prompt, &remove_list);
    add_tags(&edited, add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_tags_matches_core() {
        assert_eq!(remove_tags("a, (b:1.2), c", &["b"]), "a, c");
        assert_eq!(remove_tags("a, ((B)), [c]", &["b", "C"]), "a");
    }

    #[test]
    fn test_remove_tags_with_weighted_entry() {
        assert_eq!(remove_tags("a, b, c", &["(b:0.5)"]), "a, c");
    }

    #[test]
    fn test_remove_tags_matches_unbalanced_emphasis() {
        assert_eq!(remove_tags("x, (a:1.2))", &["a"]), "x");
        assert_eq!(remove_tags("y, ((a)", &["A"]), "y");
    }

    #[test]
    fn test_remove_entry_may_hold_several_tags() {
        assert_eq!(remove_tags("a, b, c, d", &["b, d"]), "a, c");
    }

    #[test]
    fn test_remove_tags_empty_list_is_verbatim() {
        let prompt = "a,b\n  c";
        assert_eq!(remove_tags::<&str>(prompt, &[]), prompt);
    }

    #[test]
    fn test_remove_tags_normalises_separators() {
        assert_eq!(remove_tags("a,b\nc", &["zzz"]), "a, b, c");
    }

    #[test]
    fn test_remove_lora_requires_exact_reference() {
        let prompt = "a, <lora:style:0.8>";
        assert_eq!(remove_tags(prompt, &["<lora:style:0.8>"]), "a");
        assert_eq!(remove_tags(prompt, &["lora:style"]), prompt);
    }

    #[test]
    fn test_remove_tags_is_idempotent() {
        let cases = [
            ("a, (b:1.2), c, b", vec!["b"]),
            ("x\ny, (z, w)", vec!["(z, w)", "q"]),
            ("", vec!["a"]),
        ];
        for (prompt, tags) in cases {
            let once = remove_tags(prompt, &tags);
            assert_eq!(remove_tags(&once, &tags), once);
        }
    }

    #[test]
    fn test_add_tags() {
        assert_eq!(add_tags("a, b", "c, d"), "a, b, c, d");
        assert_eq!(add_tags("", "c"), "c");
        assert_eq!(add_tags("   ", " c "), "c");
        assert_eq!(add_tags("a", ""), "a");
        assert_eq!(add_tags(" a ", "  "), " a ");
        assert_eq!(add_tags(" a ,", "b"), "a ,, b");
    }

    #[test]
    fn test_find_common_tags() {
        assert_eq!(find_common_tags(&["a, b, c", "b, c, d", "c, e"]), vec!["c"]);
        assert!(find_common_tags::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_find_common_tags_uses_first_prompt_spelling() {
        let prompts = [
            "(Masterpiece:1.2), solo, masterpiece, 1girl",
            "1GIRL, masterpiece",
        ];
        assert_eq!(find_common_tags(&prompts), vec!["Masterpiece", "1girl"]);
    }

    #[test]
    fn test_find_common_tags_single_prompt() {
        assert_eq!(find_common_tags(&["b, a, b"]), vec!["b", "a"]);
    }

    #[test]
    fn test_core_tags_are_folded_and_unique() {
        assert_eq!(
            core_tags("(A:1.1), b, [a], <LoRA:X:1>"),
            vec!["a", "b", "<lora:x:1>"]
        );
    }

    #[test]
    fn test_apply_edits() {
        assert_eq!(
            apply_edits("masterpiece, (solo:1.2), smile", "solo, smile", "standing"),
            "masterpiece, standing"
        );
        assert_eq!(apply_edits("a, b", "  ", "c"), "a, b, c");
        assert_eq!(apply_edits("a,b", "", ""), "a,b");
        assert_eq!(apply_edits("a, b", "a, b", "z"), "z");
    }
}
