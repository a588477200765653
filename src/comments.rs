use std::collections::{HashMap, HashSet};

use anyhow::Result;
use log::{debug, error};

use crate::api::Comment;

/// Comments per post, fetched lazily and kept for the page session.
///
/// A post id is a key in `buckets` exactly when its comments have been
/// fetched at least once, so an empty bucket still means "loaded".
/// Comments acknowledged before that first fetch lands wait in `pending`.
#[derive(Debug, Default)]
pub struct CommentCache {
    buckets: HashMap<u64, Vec<Comment>>,
    in_flight: HashSet<u64>,
    pending: HashMap<u64, Vec<Comment>>,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the caller has to fetch comments for `post_id`.
    /// Loaded or already requested posts answer false.
    pub fn ensure_loaded(&mut self, post_id: u64) -> bool {
        if self.buckets.contains_key(&post_id) || self.in_flight.contains(&post_id) {
            return false;
        }
        self.in_flight.insert(post_id);
        true
    }

    /// Stores a fetch result. An existing bucket is never overwritten.
    pub fn finish_load(&mut self, post_id: u64, result: Result<Vec<Comment>>) {
        if !self.in_flight.remove(&post_id) {
            debug!("dropping unrequested comments for post {post_id}");
            return;
        }
        match result {
            Ok(mut comments) => {
                if let Some(created) = self.pending.remove(&post_id) {
                    for comment in created {
                        if comments.iter().all(|existing| existing.id != comment.id) {
                            comments.push(comment);
                        }
                    }
                }
                self.buckets.entry(post_id).or_insert(comments);
            }
            Err(err) => error!("failed to load comments for post {post_id}: {err:#}"),
        }
    }

    pub fn is_loaded(&self, post_id: u64) -> bool {
        self.buckets.contains_key(&post_id)
    }

    pub fn is_loading(&self, post_id: u64) -> bool {
        self.in_flight.contains(&post_id)
    }

    pub fn get(&self, post_id: u64) -> Option<&[Comment]> {
        self.buckets.get(&post_id).map(Vec::as_slice)
    }

    pub fn count(&self, post_id: u64) -> Option<usize> {
        self.buckets.get(&post_id).map(Vec::len)
    }

    /// Adds a created comment to the bucket named by its own `post_id`.
    /// Returns false when that post has no bucket yet: the comment is held
    /// back and merged into the bucket when the first load succeeds.
    pub fn append(&mut self, comment: Comment) -> bool {
        match self.buckets.get_mut(&comment.post_id) {
            Some(bucket) => {
                bucket.push(comment);
                true
            }
            None => {
                debug!(
                    "post {} has no comment bucket yet, holding comment {}",
                    comment.post_id, comment.id
                );
                self.pending.entry(comment.post_id).or_default().push(comment);
                false
            }
        }
    }

    pub fn replace(&mut self, id: u64, updated: Comment) -> bool {
        let post_id = updated.post_id;
        let slot = self
            .buckets
            .get_mut(&post_id)
            .and_then(|bucket| bucket.iter_mut().find(|comment| comment.id == id))
            .or_else(|| {
                self.pending
                    .get_mut(&post_id)?
                    .iter_mut()
                    .find(|comment| comment.id == id)
            });
        match slot {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64, post_id: u64) -> bool {
        let mut removed = false;
        for list in [self.buckets.get_mut(&post_id), self.pending.get_mut(&post_id)]
            .into_iter()
            .flatten()
        {
            let before = list.len();
            list.retain(|comment| comment.id != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Like count to send for a like on `id`: the local count plus one.
    /// Two likes issued before either response arrives both read the same
    /// local value, so one increment can be lost.
    pub fn next_like_count(&self, id: u64, post_id: u64) -> Option<u64> {
        self.buckets
            .get(&post_id)?
            .iter()
            .find(|comment| comment.id == id)
            .map(|comment| comment.likes + 1)
    }

    pub fn find(&self, id: u64, post_id: u64) -> Option<&Comment> {
        self.buckets
            .get(&post_id)?
            .iter()
            .find(|comment| comment.id == id)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.in_flight.clear();
        self.pending.clear();
    }
}
