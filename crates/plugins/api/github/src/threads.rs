//! Reply-chain reconstruction for review comments.
//!
//! GitHub returns the review comments of a pull request as a flat list where
//! each reply points at the comment it answers. A thread grows by its tail:
//! a reply joins the thread whose last comment it answers.

use std::collections::HashMap;

use tracing::warn;

use crate::types::GitHubReviewComment;

/// Group comments into threads, roots first.
///
/// Replies are placed pass after pass until a pass places nothing; the ones
/// still pending then are dropped. Roots keep their input order, replies are
/// considered by ascending id so the grouping does not depend on input order.
pub(crate) fn rebuild_threads(comments: Vec<GitHubReviewComment>) -> Vec<Vec<GitHubReviewComment>> {
    let (roots, mut pending): (Vec<_>, Vec<_>) = comments
        .into_iter()
        .partition(|c| c.comment.in_reply_to_id.is_none());
    pending.sort_by_key(|c| c.comment.id);

    let mut threads: Vec<Vec<GitHubReviewComment>> = roots.into_iter().map(|c| vec![c]).collect();
    // last comment id -> thread index
    let mut tails: HashMap<u64, usize> = threads
        .iter()
        .enumerate()
        .map(|(index, thread)| (thread[0].comment.id, index))
        .collect();

    while !pending.is_empty() {
        let mut placed = false;
        let mut remaining = Vec::with_capacity(pending.len());

        for reply in pending.drain(..) {
            let target = reply
                .comment
                .in_reply_to_id
                .and_then(|id| tails.get(&id).copied());
            match target {
                Some(index) => {
                    if let Some(parent) = reply.comment.in_reply_to_id {
                        tails.remove(&parent);
                    }
                    tails.insert(reply.comment.id, index);
                    threads[index].push(reply);
                    placed = true;
                }
                None => remaining.push(reply),
            }
        }

        pending = remaining;
        if !placed {
            break;
        }
    }

    if !pending.is_empty() {
        warn!(
            count = pending.len(),
            ids = ?pending.iter().map(|c| c.comment.id).collect::<Vec<_>>(),
            "Dropping review comments answering an unknown comment"
        );
    }

    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GitHubComment;

    fn review_comment(id: u64, in_reply_to_id: Option<u64>) -> GitHubReviewComment {
        GitHubReviewComment {
            comment: GitHubComment {
                id,
                body: format!("comment {}", id),
                user: None,
                updated_at: "2024-01-01T00:00:00Z".to_string(),
                in_reply_to_id,
            },
            path: "analysis.ipynb".to_string(),
            line: Some(id as u32),
            original_line: None,
        }
    }

    fn ids(threads: &[Vec<GitHubReviewComment>]) -> Vec<Vec<u64>> {
        let mut ids: Vec<Vec<u64>> = threads
            .iter()
            .map(|t| t.iter().map(|c| c.comment.id).collect())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_roots_only() {
        let threads = rebuild_threads(vec![review_comment(1, None), review_comment(2, None)]);
        assert_eq!(ids(&threads), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_chain_resolved_over_several_passes() {
        // 4 answers 3, which answers 2, which answers 1; listed backwards
        let threads = rebuild_threads(vec![
            review_comment(4, Some(3)),
            review_comment(3, Some(2)),
            review_comment(1, None),
            review_comment(2, Some(1)),
            review_comment(10, None),
            review_comment(11, Some(10)),
        ]);
        assert_eq!(ids(&threads), vec![vec![1, 2, 3, 4], vec![10, 11]]);
    }

    #[test]
    fn test_orphans_are_dropped() {
        let threads = rebuild_threads(vec![
            review_comment(1, None),
            review_comment(2, Some(1)),
            review_comment(7, Some(99)),
            review_comment(8, Some(7)),
        ]);
        assert_eq!(ids(&threads), vec![vec![1, 2]]);
    }

    #[test]
    fn test_reply_to_non_tail_is_dropped() {
        // Both answer the root; only the first one extends the thread
        let threads = rebuild_threads(vec![
            review_comment(1, None),
            review_comment(3, Some(1)),
            review_comment(2, Some(1)),
        ]);
        assert_eq!(ids(&threads), vec![vec![1, 2]]);
    }

    #[test]
    fn test_grouping_ignores_input_order() {
        let comments = vec![
            review_comment(1, None),
            review_comment(2, Some(1)),
            review_comment(3, Some(2)),
            review_comment(5, None),
            review_comment(6, Some(5)),
        ];
        let mut reversed = comments.clone();
        reversed.reverse();
        let mut rotated = comments.clone();
        rotated.rotate_left(2);

        let expected = ids(&rebuild_threads(comments));
        assert_eq!(ids(&rebuild_threads(reversed)), expected);
        assert_eq!(ids(&rebuild_threads(rotated)), expected);
        assert_eq!(expected, vec![vec![1, 2, 3], vec![5, 6]]);
    }

    #[test]
    fn test_idempotent() {
        let comments = vec![
            review_comment(3, Some(2)),
            review_comment(1, None),
            review_comment(2, Some(1)),
        ];
        let first = rebuild_threads(comments.clone());
        let second = rebuild_threads(comments);
        assert_eq!(ids(&first), ids(&second));

        let flattened: Vec<_> = first.into_iter().flatten().collect();
        assert_eq!(ids(&rebuild_threads(flattened)), vec![vec![1, 2, 3]]);
    }
}
