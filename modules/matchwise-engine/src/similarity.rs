//! String similarity primitives shared by scoring and deduplication.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid token split regex"));

/// Tokens this short carry no signal ("of", "an", "&").
const MIN_TOKEN_LEN: usize = 3;

/// Lowercase and drop everything that isn't a letter or digit.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Classic Levenshtein edit distance over chars, two-row DP.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let insertion = curr[j] + 1;
            let deletion = prev[j + 1] + 1;
            curr[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized edit similarity in [0, 1]. Reflexive and symmetric.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    let distance = levenshtein(&a, &b);
    1.0 - distance as f64 / longest as f64
}

/// Lowercased word tokens longer than two characters.
pub fn tokens(s: &str) -> HashSet<String> {
    TOKEN_SPLIT_RE
        .split(s)
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard overlap of the token sets. 0 when both are empty.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    jaccard(&tokens(a), &tokens(b))
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Split a free-text interest field into trimmed, lowercased tags.
pub fn interest_tags(s: &str) -> Vec<String> {
    s.split([',', ';', '|', '\n'])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Half the weight on an exact domain match, half on local-part similarity.
pub fn email_similarity(a: &str, b: &str) -> f64 {
    match (a.trim().rsplit_once('@'), b.trim().rsplit_once('@')) {
        (Some((local_a, domain_a)), Some((local_b, domain_b))) => {
            let domain = if domain_a.eq_ignore_ascii_case(domain_b) {
                0.5
            } else {
                0.0
            };
            domain + 0.5 * string_similarity(local_a, local_b)
        }
        _ => 0.5 * string_similarity(a, b),
    }
}

/// Phone numbers compared on digits only.
pub fn phones_match(a: &str, b: &str) -> bool {
    let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
    let (a, b) = (digits(a), digits(b));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_known_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn similarity_is_reflexive_and_symmetric() {
        let samples = [
            "Acme Corp",
            "ACME corp.",
            "Globex International",
            "",
            "Initech",
            "Zoë's Café",
        ];
        for a in samples {
            assert_eq!(string_similarity(a, a), 1.0, "reflexive for {a:?}");
            for b in samples {
                assert_eq!(
                    string_similarity(a, b),
                    string_similarity(b, a),
                    "symmetric for {a:?} / {b:?}"
                );
            }
        }
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(string_similarity("Acme, Inc.", "acme inc"), 1.0);
        let sim = string_similarity("Acme Inc", "Acme Incorporated");
        assert!(sim > 0.4 && sim < 1.0, "partial similarity: {sim}");
    }

    #[test]
    fn token_overlap_drops_short_tokens() {
        // "of" and "ai" are dropped; {cloud, data} vs {cloud, security}
        let overlap = token_overlap("cloud of data, AI", "cloud security");
        assert!((overlap - 1.0 / 3.0).abs() < 1e-9, "overlap: {overlap}");
        assert_eq!(token_overlap("", ""), 0.0);
        assert_eq!(token_overlap("an of", "to be"), 0.0);
    }

    #[test]
    fn interest_tags_split_on_separators() {
        assert_eq!(
            interest_tags("Technology, innovation;  Green Energy |"),
            vec!["technology", "innovation", "green energy"]
        );
    }

    #[test]
    fn email_similarity_weights_domain() {
        assert_eq!(email_similarity("jane@acme.com", "JANE@ACME.COM"), 1.0);
        let same_domain = email_similarity("jane.doe@acme.com", "jdoe@acme.com");
        let other_domain = email_similarity("jane.doe@acme.com", "jdoe@globex.com");
        assert!(same_domain > other_domain);
        assert!(other_domain < 0.5);
    }

    #[test]
    fn phones_compare_digits_only() {
        assert!(phones_match("+1 (555) 010-2000", "15550102000"));
        assert!(!phones_match("", ""));
        assert!(!phones_match("555-0100", "555-0101"));
    }
}
