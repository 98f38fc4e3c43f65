//! Correlation of imported candidate handles against the remote block list.

use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;

use crate::error::Error;
use crate::gateway::{AccountGateway, BLOCKS_PAGE_SIZE, BlockedAccount};
use crate::types::Handle;

/// Upper bound on `listBlocked` calls per traversal.
pub const MAX_BLOCK_PAGES: usize = 1000;

/// Block status of one candidate that exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub handle: Handle,
    pub is_blocked: bool,
}

/// Counts for a correlation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationSummary {
    pub blocked_count: usize,
    pub not_blocked_count: usize,
}

impl CorrelationSummary {
    #[must_use]
    pub fn of(results: &[CorrelationResult]) -> Self {
        let blocked_count = results.iter().filter(|r| r.is_blocked).count();
        Self {
            blocked_count,
            not_blocked_count: results.len() - blocked_count,
        }
    }
}

/// Candidates that exist remotely, in input order.
///
/// All probes run at once; a failed probe drops the candidate.
/// Duplicates are not removed.
pub async fn existing<G: AccountGateway>(
    gateway: &G,
    viewer: &Handle,
    candidates: &[Handle],
) -> Vec<Handle> {
    let probes = candidates
        .iter()
        .map(|candidate| gateway.profile_exists(viewer, candidate));
    let found = join_all(probes).await;

    candidates
        .iter()
        .zip(found)
        .filter_map(|(candidate, exists)| exists.then(|| candidate.clone()))
        .collect()
}

/// Walks every page of `viewer`'s blocked list, strictly in sequence.
///
/// # Errors
///
/// Propagates gateway errors. Returns [`Error::PaginationExhausted`] past
/// `max_pages` pages or when the remote repeats a cursor, carrying the
/// number of pages fetched.
pub async fn all_blocked<G: AccountGateway>(
    gateway: &G,
    viewer: &Handle,
    max_pages: usize,
) -> Result<Vec<BlockedAccount>, Error> {
    let mut accounts = Vec::new();
    let mut cursor: Option<String> = None;

    for fetched in 1..=max_pages {
        let page = gateway
            .list_blocked(viewer, cursor.as_deref(), BLOCKS_PAGE_SIZE)
            .await?;
        accounts.extend(page.accounts);

        match page.next_cursor {
            None => return Ok(accounts),
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                tracing::warn!(viewer = %viewer, cursor = %next, "remote repeated a cursor");
                return Err(Error::PaginationExhausted(fetched));
            }
            Some(next) => cursor = Some(next),
        }
    }

    Err(Error::PaginationExhausted(max_pages))
}

/// Lowercased local parts (before the first `.`) of every blocked handle.
#[must_use]
pub fn blocked_local_parts(accounts: &[BlockedAccount]) -> HashSet<String> {
    accounts.iter().map(|a| a.handle.local_part()).collect()
}

/// Full correlation: existence filter, complete block traversal, then a
/// case-insensitive match on local parts.
///
/// The block list is fetched even when no candidate exists.
///
/// # Errors
///
/// Fails only if the block traversal fails; probe failures just exclude
/// candidates.
pub async fn correlate<G: AccountGateway>(
    gateway: &G,
    viewer: &Handle,
    candidates: &[Handle],
) -> Result<Vec<CorrelationResult>, Error> {
    let found = existing(gateway, viewer, candidates).await;
    let blocked = blocked_local_parts(&all_blocked(gateway, viewer, MAX_BLOCK_PAGES).await?);

    let results: Vec<CorrelationResult> = found
        .into_iter()
        .map(|handle| {
            let is_blocked = blocked.contains(&handle.local_part());
            CorrelationResult { handle, is_blocked }
        })
        .collect();

    tracing::debug!(
        viewer = %viewer,
        candidates = candidates.len(),
        found = results.len(),
        blocked_remote = blocked.len(),
        "correlation finished"
    );
    Ok(results)
}
