//! Merge event pipeline: validate the event, extract issue references, match
//! active bounties, create payouts, notify contributors.
//!
//! Webhook delivery is at-least-once, so the pipeline never assumes it runs
//! once per merge: the payout ledger's (bounty, pull request) uniqueness key
//! absorbs duplicate deliveries, the one-live-payout-per-bounty key stops two
//! different merges from both paying the same bounty, and the bounty
//! transition is a conditional update that only one delivery can win.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::db::models::{BountyStatus, Payout};
use crate::db::store::{Store, StoreError};
use crate::error::AppError;
use crate::github::{GithubApi, PullRequestEvent};
use crate::refs::extract_issue_numbers;

/// Pause between bounty iterations, for the GitHub API's rate limits.
pub const DEFAULT_BOUNTY_PACE: Duration = Duration::from_millis(500);

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Valid event that this pipeline does not act on. Not an error.
    Skipped { reason: &'static str },
    NoReferences,
    NoMatchingBounties,
    Processed {
        payouts_created: usize,
        duplicates: usize,
        skipped: usize,
        notified: usize,
    },
}

enum BountyResult {
    Created { notified: bool },
    Duplicate,
    Skipped,
}

pub struct MergeEventHandler {
    store: Arc<dyn Store>,
    github: Arc<dyn GithubApi>,
    claim_base_url: String,
    pace: Duration,
}

impl MergeEventHandler {
    pub fn new(
        store: Arc<dyn Store>,
        github: Arc<dyn GithubApi>,
        claim_base_url: String,
        pace: Duration,
    ) -> Self {
        Self {
            store,
            github,
            claim_base_url,
            pace,
        }
    }

    pub async fn handle(&self, event: &PullRequestEvent) -> Result<MergeOutcome, AppError> {
        if event.action != "closed" || !event.pull_request.merged {
            return Ok(MergeOutcome::Skipped {
                reason: "not a merged pull request",
            });
        }

        // Bounties apply to public repositories only.
        if event.repository.private {
            tracing::info!(
                repository = %event.repository.full_name,
                "skipping merge event from private repository"
            );
            return Ok(MergeOutcome::Skipped {
                reason: "private repository",
            });
        }

        let text = format!(
            "{}\n{}",
            event.pull_request.title,
            event.pull_request.body.as_deref().unwrap_or_default()
        );
        let references = extract_issue_numbers(&text);
        if references.is_empty() {
            tracing::info!(
                repository = %event.repository.full_name,
                pull_request = event.pull_request.number,
                "merged pull request references no issues"
            );
            return Ok(MergeOutcome::NoReferences);
        }

        let active = self
            .store
            .find_active_bounties(event.repository.id)
            .await?;
        let matched: Vec<_> = active
            .into_iter()
            .filter(|bounty| references.contains(&(bounty.issue_number as u64)))
            .collect();
        if matched.is_empty() {
            return Ok(MergeOutcome::NoMatchingBounties);
        }

        let mut payouts_created = 0;
        let mut duplicates = 0;
        let mut skipped = 0;
        let mut notified = 0;

        // Bounties are processed sequentially with a pause in between.
        // Per-bounty failures are isolated: one bad reference must not abort
        // the other matches in the same event.
        for (i, bounty) in matched.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pace).await;
            }

            match self.process_bounty(event, bounty).await {
                Ok(BountyResult::Created { notified: sent }) => {
                    payouts_created += 1;
                    if sent {
                        notified += 1;
                    }
                }
                Ok(BountyResult::Duplicate) => duplicates += 1,
                Ok(BountyResult::Skipped) => skipped += 1,
                Err(err) => {
                    tracing::error!(
                        bounty_id = %bounty.id,
                        issue_number = bounty.issue_number,
                        error = %err,
                        "bounty processing failed; continuing with remaining matches"
                    );
                    skipped += 1;
                }
            }
        }

        Ok(MergeOutcome::Processed {
            payouts_created,
            duplicates,
            skipped,
            notified,
        })
    }

    async fn process_bounty(
        &self,
        event: &PullRequestEvent,
        bounty: &crate::db::models::Bounty,
    ) -> Result<BountyResult, AppError> {
        let repo = &event.repository;
        let pr = &event.pull_request;

        // The reference could be spoofed or stale; confirm the issue exists
        // and is not itself a pull request before paying anything.
        let issue = match self.github.get_issue(&repo.full_name, bounty.issue_number).await {
            Ok(issue) => issue,
            Err(err) => {
                tracing::warn!(
                    repository = %repo.full_name,
                    issue_number = bounty.issue_number,
                    error = %err,
                    "issue lookup failed; skipping bounty"
                );
                return Ok(BountyResult::Skipped);
            }
        };
        if issue.is_pull_request {
            tracing::warn!(
                repository = %repo.full_name,
                issue_number = bounty.issue_number,
                "referenced number is a pull request, not an issue; skipping bounty"
            );
            return Ok(BountyResult::Skipped);
        }

        let payout = Payout::for_merged_pull_request(
            bounty,
            pr.id,
            pr.number,
            pr.user.id,
            pr.user.login.clone(),
        );
        let payout = match self.store.insert_payout(payout).await {
            Ok(payout) => payout,
            Err(StoreError::Duplicate(_)) => {
                tracing::info!(
                    bounty_id = %bounty.id,
                    pull_request = pr.number,
                    "payout already recorded; duplicate delivery or bounty already matched"
                );
                // The existing payout may come from a delivery that lost the
                // status flip below; finish the flip on its behalf so the
                // bounty does not stay matchable forever.
                if self
                    .store
                    .transition_bounty(bounty.id, BountyStatus::Active, BountyStatus::PendingPayout)
                    .await?
                {
                    tracing::info!(
                        bounty_id = %bounty.id,
                        "bounty moved to pending_payout on redelivery"
                    );
                }
                return Ok(BountyResult::Duplicate);
            }
            Err(err) => return Err(err.into()),
        };

        let moved = self
            .store
            .transition_bounty(bounty.id, BountyStatus::Active, BountyStatus::PendingPayout)
            .await?;
        if !moved {
            tracing::info!(
                bounty_id = %bounty.id,
                "bounty already left active; concurrent delivery won the transition"
            );
        }

        // Notification is best-effort: a comment failure never rolls back
        // the payout.
        let claim_link = format!("{}/{}", self.claim_base_url.trim_end_matches('/'), payout.id);
        let comment = format!(
            "@{login} the {amount} {currency} bounty on #{issue} is yours! Claim it here: {link}",
            login = payout.contributor_login,
            amount = payout.amount,
            currency = payout.currency,
            issue = bounty.issue_number,
            link = claim_link,
        );
        let notified = match self
            .github
            .post_comment(&repo.full_name, pr.number, &comment)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    payout_id = %payout.id,
                    error = %err,
                    "claim notification failed; payout stands"
                );
                false
            }
        };

        tracing::info!(
            payout_id = %payout.id,
            bounty_id = %bounty.id,
            contributor = %payout.contributor_login,
            amount = %payout.amount,
            "payout created for merged pull request"
        );

        Ok(BountyResult::Created { notified })
    }
}
