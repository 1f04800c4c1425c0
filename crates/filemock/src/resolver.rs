//! Request resolution: pick the best-matching mock for a request.
//!
//! Matching proceeds in three stages: structural route match, constraint
//! check (methods, set, query), then content negotiation. Survivors are
//! scored by specificity and the highest score wins; ties resolve to the
//! first candidate in repository scan order, which is sorted and therefore
//! deterministic.

use crate::descriptor::MockDescriptor;
use crate::negotiate::{accepts, AcceptEntry};
use std::collections::BTreeMap;
use tracing::debug;

/// A selected mock with its extracted route parameters.
#[derive(Debug)]
pub struct ResolvedMock {
    pub mock: MockDescriptor,
    pub params: BTreeMap<String, String>,
}

/// Resolve a request against the candidate list.
///
/// `path` is the request path without the leading slash, `query` the decoded
/// query parameters, `active_set` the server's configured mock set.
pub fn resolve(
    mocks: Vec<MockDescriptor>,
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    accept: &[AcceptEntry],
    active_set: Option<&str>,
) -> Option<ResolvedMock> {
    let method = method.to_lowercase();
    let mut best: Option<(f64, ResolvedMock)> = None;

    for mock in mocks {
        let params = match mock.pattern.match_path(path) {
            Some(params) => params,
            None => continue,
        };
        if !matches_constraints(&mock, &method, query, active_set) {
            continue;
        }
        let score = match negotiated_score(&mock, accept) {
            Some(score) => score,
            None => continue,
        };

        debug!(route = %mock.route, score, "candidate mock");
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, ResolvedMock { mock, params }));
        }
    }

    best.map(|(_, resolved)| resolved)
}

/// Resolve against the not-found mock set. These are error documents, not
/// routes, so the structural path match is skipped; constraints and content
/// negotiation still apply.
pub fn resolve_not_found(
    mocks: Vec<MockDescriptor>,
    method: &str,
    query: &BTreeMap<String, String>,
    accept: &[AcceptEntry],
    active_set: Option<&str>,
) -> Option<ResolvedMock> {
    let method = method.to_lowercase();
    let mut best: Option<(f64, ResolvedMock)> = None;

    for mock in mocks {
        if !matches_constraints(&mock, &method, query, active_set) {
            continue;
        }
        let score = match negotiated_score(&mock, accept) {
            Some(score) => score,
            None => continue,
        };
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((
                score,
                ResolvedMock {
                    mock,
                    params: BTreeMap::new(),
                },
            ));
        }
    }

    best.map(|(_, resolved)| resolved)
}

fn matches_constraints(
    mock: &MockDescriptor,
    method: &str,
    query: &BTreeMap<String, String>,
    active_set: Option<&str>,
) -> bool {
    if let Some(methods) = &mock.methods {
        if !methods.iter().any(|m| m == method) {
            return false;
        }
    }
    if let Some(set) = &mock.set {
        if active_set != Some(set.as_str()) {
            return false;
        }
    }
    if let Some(constraints) = &mock.query {
        // Extra query parameters are ignored; constrained ones must match
        // exactly.
        if !constraints
            .iter()
            .all(|(k, v)| query.get(k).is_some_and(|actual| actual == v))
        {
            return false;
        }
    }
    true
}

/// Specificity score for a surviving candidate, or `None` when content
/// negotiation excludes it.
///
/// Extension-less and executable mocks decide their type at render time and
/// are always eligible; the `+0.1` bonus keeps statically negotiated matches
/// ahead of them at equal specificity. The `+0.5` bonus prefers file-backed
/// mocks over collection entries when otherwise equal.
fn negotiated_score(mock: &MockDescriptor, accept: &[AcceptEntry]) -> Option<f64> {
    let negotiated = accepts(accept, &mock.mime_type());
    if !negotiated && !mock.is_executable() && !mock.ext.is_empty() {
        return None;
    }

    let mut score = 0.0;
    if mock.methods.is_some() {
        score += 1.0;
    }
    if mock.set.is_some() {
        score += 2.0;
    }
    if mock.query.is_some() {
        score += 4.0;
    }
    if mock.is_file_backed() {
        score += 0.5;
    }
    if negotiated {
        score += 0.1;
    }
    Some(score)
}
