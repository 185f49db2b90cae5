//! Pluggable bounty scoring.
//!
//! Scoring takes issue metadata and suggests a complexity tag and amount.
//! It is pure and lives outside the payout state machine; strategies are
//! interchangeable behind one trait.

use bigdecimal::BigDecimal;

use crate::db::models::Complexity;

#[derive(Debug, Clone, Default)]
pub struct IssueSignals {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub comments: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BountySuggestion {
    pub complexity: Complexity,
    pub amount: BigDecimal,
}

pub trait ComplexityScorer: Send + Sync {
    fn suggest(&self, issue: &IssueSignals) -> BountySuggestion;
}

fn suggestion(complexity: Complexity) -> BountySuggestion {
    let amount = match complexity {
        Complexity::Low => BigDecimal::from(25),
        Complexity::Medium => BigDecimal::from(75),
        Complexity::High => BigDecimal::from(200),
        Complexity::Critical => BigDecimal::from(500),
    };
    BountySuggestion { complexity, amount }
}

/// Scores from issue labels alone.
pub struct LabelScorer;

impl ComplexityScorer for LabelScorer {
    fn suggest(&self, issue: &IssueSignals) -> BountySuggestion {
        // The highest-ranked informative label wins; uninformative labels
        // fall back to medium.
        let mut best: Option<Complexity> = None;

        for label in &issue.labels {
            let label = label.to_ascii_lowercase();
            let candidate = if label.contains("security") || label.contains("critical") {
                Complexity::Critical
            } else if label.contains("bug") || label.contains("enhancement") {
                Complexity::High
            } else if label.contains("good first issue") || label.contains("documentation") {
                Complexity::Low
            } else {
                continue;
            };

            best = match best {
                Some(current) if rank(current) >= rank(candidate) => Some(current),
                _ => Some(candidate),
            };
        }

        suggestion(best.unwrap_or(Complexity::Medium))
    }
}

/// Scores from title/body text when labels are absent or uninformative.
pub struct TextHeuristicScorer;

impl ComplexityScorer for TextHeuristicScorer {
    fn suggest(&self, issue: &IssueSignals) -> BountySuggestion {
        let text = format!("{} {}", issue.title, issue.body).to_ascii_lowercase();

        let complexity = if ["security", "vulnerability", "data loss", "exploit"]
            .iter()
            .any(|kw| text.contains(kw))
        {
            Complexity::Critical
        } else if ["crash", "panic", "deadlock", "race condition"]
            .iter()
            .any(|kw| text.contains(kw))
            || issue.body.len() > 1500
        {
            Complexity::High
        } else if issue.body.len() < 200 && issue.comments < 3 {
            Complexity::Low
        } else {
            Complexity::Medium
        };

        suggestion(complexity)
    }
}

fn rank(complexity: Complexity) -> u8 {
    match complexity {
        Complexity::Low => 0,
        Complexity::Medium => 1,
        Complexity::High => 2,
        Complexity::Critical => 3,
    }
}
