//! Mention markup: `@[Display Name](user-id)`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::store::{EntityStore, User};

static MENTION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@\[([^\]]+)\]\(([A-Za-z0-9-]+)\)").ok());

/// Candidate user ids referenced by `content`, de-duplicated.
///
/// Ids are not checked against the store; see [`resolve_mentions`].
pub fn parse_mentions(content: &str) -> BTreeSet<String> {
    let Some(regex) = MENTION_REGEX.as_ref() else {
        return BTreeSet::new();
    };
    regex
        .captures_iter(content)
        .filter_map(|caps| caps.get(2))
        .map(|id| id.as_str().to_string())
        .collect()
}

/// Users mentioned in `content` that exist, looked up in one batch.
pub async fn resolve_mentions(store: &dyn EntityStore, content: &str) -> Result<Vec<User>> {
    let candidates: Vec<String> = parse_mentions(content).into_iter().collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let users = store.users_by_ids(&candidates).await?;
    if users.len() < candidates.len() {
        debug!(
            candidates = candidates.len(),
            resolved = users.len(),
            "dropped unresolvable mentions"
        );
    }
    Ok(users)
}
