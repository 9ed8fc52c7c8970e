//! Name suggestions for diagnostics

/// Levenshtein edit distance between two strings, using two rows.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Closest candidate within `threshold` edits. Exact matches are skipped:
/// a name that exists needs no suggestion.
pub fn find_similar_name<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    threshold: usize,
) -> Option<&'a str> {
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(name, candidate);
        if distance > 0 && distance < best_distance && distance <= threshold {
            best_distance = distance;
            best_match = Some(candidate);
        }
    }

    best_match
}

/// "did you mean" line for an unknown name
pub fn suggestion_hint(suggestion: Option<&str>) -> Option<String> {
    suggestion.map(|name| format!("did you mean `{name}`?"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein_distance("print", "print"), 0);
    }

    #[test]
    fn test_levenshtein_single_edit() {
        assert_eq!(levenshtein_distance("prnt", "print"), 1);
        assert_eq!(levenshtein_distance("pairs", "pair"), 1);
    }

    #[test]
    fn test_levenshtein_empty_strings() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "xy"), 2);
    }

    #[test]
    fn test_levenshtein_case_sensitive() {
        assert_eq!(levenshtein_distance("Print", "print"), 1);
    }

    #[test]
    fn test_find_similar_name_close() {
        let names = ["print", "pairs", "ipairs"];
        assert_eq!(find_similar_name("prnt", names, 2), Some("print"));
        assert_eq!(find_similar_name("ipars", names, 2), Some("ipairs"));
    }

    #[test]
    fn test_find_similar_name_skips_exact_and_far() {
        let names = ["print"];
        assert_eq!(find_similar_name("print", names, 2), None);
        assert_eq!(find_similar_name("setmetatable", names, 2), None);
    }

    #[test]
    fn test_suggestion_hint() {
        assert_eq!(suggestion_hint(Some("print")).as_deref(), Some("did you mean `print`?"));
        assert_eq!(suggestion_hint(None), None);
    }
}
