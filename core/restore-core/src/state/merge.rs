//! Pure combination rules for resolved-session lists.

use std::collections::{BTreeSet, HashSet};

use crate::types::{HostContext, ResolvedSession};

/// Drops repeated entries, keeping the first occurrence of each key.
pub fn dedupe<I>(entries: I) -> Vec<ResolvedSession>
where
    I: IntoIterator<Item = ResolvedSession>,
{
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.dedup_key()))
        .collect()
}

/// Combines freshly saved entries with the current pending-restore contents.
///
/// With `scope = Some(ctx)`, only `new` entries of `ctx` are written and every
/// existing entry of another context is carried over. With `scope = None`,
/// each context that has new entries is replaced wholesale; contexts with no
/// new entries keep what they had.
pub fn merge_scoped(
    new: &[ResolvedSession],
    existing: &[ResolvedSession],
    scope: Option<HostContext>,
) -> Vec<ResolvedSession> {
    let fresh: Vec<ResolvedSession> = new
        .iter()
        .filter(|entry| scope.map_or(true, |ctx| entry.host == ctx))
        .cloned()
        .collect();

    let replaced: BTreeSet<HostContext> = match scope {
        Some(ctx) => BTreeSet::from([ctx]),
        None => fresh.iter().map(|entry| entry.host).collect(),
    };

    let preserved = existing
        .iter()
        .filter(|entry| !replaced.contains(&entry.host))
        .cloned();

    dedupe(fresh.into_iter().chain(preserved))
}

/// Entries of `host`, in order.
pub fn of_host(entries: &[ResolvedSession], host: HostContext) -> Vec<ResolvedSession> {
    entries
        .iter()
        .filter(|entry| entry.host == host)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolKind;

    fn ghostty(id: &str) -> ResolvedSession {
        ResolvedSession::new(ToolKind::Claude, Some(id.to_string()), "/tmp/g")
    }

    fn cmux(id: &str) -> ResolvedSession {
        ResolvedSession::new(ToolKind::Claude, Some(id.to_string()), "/tmp/c")
            .in_workspace("ws-1", Some("s-1"), 0)
    }

    #[test]
    fn dedupe_is_order_preserving_and_idempotent() {
        let list = vec![ghostty("a"), cmux("b"), ghostty("a"), ghostty("c"), cmux("b")];
        let once = dedupe(list);
        assert_eq!(once, vec![ghostty("a"), cmux("b"), ghostty("c")]);
        assert_eq!(dedupe(once.clone()), once);
    }

    #[test]
    fn scoped_write_preserves_other_context() {
        let existing = vec![cmux("old-c"), ghostty("old-g")];
        let merged = merge_scoped(&[ghostty("new-g")], &existing, Some(HostContext::Ghostty));
        assert_eq!(merged, vec![ghostty("new-g"), cmux("old-c")]);

        let merged = merge_scoped(&[cmux("new-c")], &existing, Some(HostContext::Cmux));
        assert_eq!(merged, vec![cmux("new-c"), ghostty("old-g")]);
    }

    #[test]
    fn scoped_write_ignores_new_entries_outside_scope() {
        let merged = merge_scoped(&[ghostty("g"), cmux("c")], &[], Some(HostContext::Cmux));
        assert_eq!(merged, vec![cmux("c")]);
    }

    #[test]
    fn unscoped_write_replaces_only_contexts_it_has_entries_for() {
        let existing = vec![cmux("queued-c"), ghostty("old-g")];
        let merged = merge_scoped(&[ghostty("new-g")], &existing, None);
        assert_eq!(merged, vec![ghostty("new-g"), cmux("queued-c")]);

        let merged = merge_scoped(&[ghostty("g"), cmux("c")], &existing, None);
        assert_eq!(merged, vec![ghostty("g"), cmux("c")]);
    }

    #[test]
    fn merge_dedupes_across_sources() {
        let merged = merge_scoped(&[ghostty("g"), ghostty("g")], &[cmux("c"), cmux("c")], None);
        assert_eq!(merged, vec![ghostty("g"), cmux("c")]);
    }
}
