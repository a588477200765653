//! Create/update/delete/like for posts and comments.
//!
//! A [`Mutation`] is sent to the server first; only the acknowledged
//! [`MutationOutcome`] is merged into the in-memory collections, so a
//! failure leaves them exactly as they were.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::api::{Comment, NewCommentBody, NewPost, Post, PostPatch};
use crate::comments::CommentCache;
use crate::data::{CommentService, PostService};
use crate::posts::PostCollection;

/// Edit form contents for an existing post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEdit {
    pub id: u64,
    pub title: String,
    pub body: String,
}

impl PostEdit {
    pub fn from_post(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            body: post.body.clone(),
        }
    }

    pub fn patch(&self) -> PostPatch {
        PostPatch {
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

/// Add-comment form contents. The post is filled in when the form is
/// opened from a post's detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub body: String,
    pub post_id: Option<u64>,
    pub user_id: u64,
}

impl Default for NewComment {
    fn default() -> Self {
        Self {
            body: String::new(),
            post_id: None,
            user_id: 1,
        }
    }
}

impl NewComment {
    pub fn for_post(post_id: u64) -> Self {
        Self {
            post_id: Some(post_id),
            ..Self::default()
        }
    }

    pub fn to_request(&self) -> Option<NewCommentBody> {
        Some(NewCommentBody {
            body: self.body.clone(),
            post_id: self.post_id?,
            user_id: self.user_id,
        })
    }
}

/// Edit form contents for an existing comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub id: u64,
    pub post_id: u64,
    pub body: String,
}

impl CommentEdit {
    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            body: comment.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreatePost(NewPost),
    UpdatePost(PostEdit),
    DeletePost(u64),
    CreateComment(NewCommentBody),
    UpdateComment(CommentEdit),
    DeleteComment { id: u64, post_id: u64 },
    LikeComment { id: u64, post_id: u64, likes: u64 },
}

impl Mutation {
    /// Builds a like from the locally cached count. `None` when the
    /// comment is not in the cache.
    pub fn like(cache: &CommentCache, id: u64, post_id: u64) -> Option<Self> {
        let likes = cache.next_like_count(id, post_id)?;
        Some(Mutation::LikeComment { id, post_id, likes })
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::CreatePost(_) => write!(f, "create post"),
            Mutation::UpdatePost(edit) => write!(f, "update post {}", edit.id),
            Mutation::DeletePost(id) => write!(f, "delete post {id}"),
            Mutation::CreateComment(draft) => write!(f, "add comment to post {}", draft.post_id),
            Mutation::UpdateComment(edit) => write!(f, "update comment {}", edit.id),
            Mutation::DeleteComment { id, .. } => write!(f, "delete comment {id}"),
            Mutation::LikeComment { id, .. } => write!(f, "like comment {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    PostCreated(Post),
    PostUpdated(Post),
    PostDeleted(u64),
    CommentCreated(Comment),
    CommentUpdated(Comment),
    CommentDeleted { id: u64, post_id: u64 },
    CommentLiked(Comment),
}

#[derive(Clone)]
pub struct MutationCoordinator {
    posts: Arc<dyn PostService + Send + Sync>,
    comments: Arc<dyn CommentService + Send + Sync>,
}

impl MutationCoordinator {
    pub fn new(
        posts: Arc<dyn PostService + Send + Sync>,
        comments: Arc<dyn CommentService + Send + Sync>,
    ) -> Self {
        Self { posts, comments }
    }

    /// Sends the mutation to the server. Blocking; run it off the owner.
    pub fn execute(&self, mutation: &Mutation) -> Result<MutationOutcome> {
        let outcome = match mutation {
            Mutation::CreatePost(draft) => {
                MutationOutcome::PostCreated(self.posts.create_post(draft)?)
            }
            Mutation::UpdatePost(edit) => {
                MutationOutcome::PostUpdated(self.posts.update_post(edit.id, &edit.patch())?)
            }
            Mutation::DeletePost(id) => {
                self.posts.delete_post(*id)?;
                MutationOutcome::PostDeleted(*id)
            }
            Mutation::CreateComment(draft) => {
                MutationOutcome::CommentCreated(self.comments.create_comment(draft)?)
            }
            Mutation::UpdateComment(edit) => {
                MutationOutcome::CommentUpdated(self.comments.update_comment(edit.id, &edit.body)?)
            }
            Mutation::DeleteComment { id, post_id } => {
                self.comments.delete_comment(*id)?;
                MutationOutcome::CommentDeleted {
                    id: *id,
                    post_id: *post_id,
                }
            }
            Mutation::LikeComment { id, likes, .. } => {
                MutationOutcome::CommentLiked(self.comments.like_comment(*id, *likes)?)
            }
        };
        Ok(outcome)
    }
}

/// Merges an acknowledged mutation into the collections. `total` is left
/// alone; it stays the server's count for the last list fetch.
pub fn apply(outcome: MutationOutcome, posts: &mut PostCollection, comments: &mut CommentCache) {
    match outcome {
        MutationOutcome::PostCreated(post) => posts.prepend(post),
        MutationOutcome::PostUpdated(post) => {
            posts.replace(post);
        }
        MutationOutcome::PostDeleted(id) => {
            posts.remove(id);
        }
        MutationOutcome::CommentCreated(comment) => {
            comments.append(comment);
        }
        MutationOutcome::CommentUpdated(comment) | MutationOutcome::CommentLiked(comment) => {
            comments.replace(comment.id, comment);
        }
        MutationOutcome::CommentDeleted { id, post_id } => {
            comments.remove(id, post_id);
        }
    }
}
