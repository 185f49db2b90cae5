//! Issue reference extraction from pull request text.

use std::sync::OnceLock;

use regex::Regex;

static ISSUE_REF: OnceLock<Regex> = OnceLock::new();

fn issue_ref() -> &'static Regex {
    ISSUE_REF.get_or_init(|| {
        Regex::new(r"(?i)(?:(?:fixes|fix|closes|close|resolves|resolve)\s+)?#(\d+)")
            .expect("issue reference pattern is valid")
    })
}

/// Extracts issue numbers referenced in free text, e.g. a PR title plus body.
///
/// Matches `#123` on its own as well as the closing-verb forms GitHub
/// recognizes (`fixes #1`, `Closes #2`, `resolves #3`). Numbers are returned
/// in first-occurrence order and are not deduplicated. `#0` is never a valid
/// issue reference and is dropped.
pub fn extract_issue_numbers(text: &str) -> Vec<u64> {
    issue_ref()
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter(|n| *n != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_reference() {
        assert_eq!(extract_issue_numbers("see #42 for details"), vec![42]);
    }

    #[test]
    fn extracts_reference_at_start_of_text() {
        assert_eq!(extract_issue_numbers("#999 at the beginning"), vec![999]);
    }

    #[test]
    fn extracts_verb_prefixed_references_in_order() {
        assert_eq!(
            extract_issue_numbers("This fixes #123 and also resolves #456"),
            vec![123, 456]
        );
    }

    #[test]
    fn closing_verbs_are_case_insensitive() {
        assert_eq!(extract_issue_numbers("FIXES #7, Closes #8"), vec![7, 8]);
    }

    #[test]
    fn zero_is_not_a_valid_reference() {
        assert_eq!(extract_issue_numbers("Closes #0 (invalid)"), Vec::<u64>::new());
    }

    #[test]
    fn leading_zeros_parse_to_the_numeric_value() {
        assert_eq!(extract_issue_numbers("fix #007"), vec![7]);
    }

    #[test]
    fn empty_and_unrelated_text_yield_nothing() {
        assert_eq!(extract_issue_numbers(""), Vec::<u64>::new());
        assert_eq!(
            extract_issue_numbers("no references here, just #hashtag"),
            Vec::<u64>::new()
        );
    }

    #[test]
    fn duplicates_are_preserved() {
        assert_eq!(extract_issue_numbers("#5 then fixes #5"), vec![5, 5]);
    }
}
