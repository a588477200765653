use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::{
    self, Comment, CommentPatch, NewCommentBody, NewPost, Post, PostPatch, PostsResponse, Tag,
    User,
};

pub trait PostService: Send + Sync {
    fn list_posts(&self, skip: u32, limit: u32) -> Result<PostsResponse>;
    fn search_posts(&self, query: &str) -> Result<PostsResponse>;
    fn posts_by_tag(&self, tag: &str) -> Result<PostsResponse>;
    fn list_tags(&self) -> Result<Vec<Tag>>;
    fn create_post(&self, draft: &NewPost) -> Result<Post>;
    fn update_post(&self, id: u64, patch: &PostPatch) -> Result<Post>;
    fn delete_post(&self, id: u64) -> Result<()>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, post_id: u64) -> Result<Vec<Comment>>;
    fn create_comment(&self, draft: &NewCommentBody) -> Result<Comment>;
    fn update_comment(&self, id: u64, body: &str) -> Result<Comment>;
    fn like_comment(&self, id: u64, likes: u64) -> Result<Comment>;
    fn delete_comment(&self, id: u64) -> Result<()>;
}

pub trait UserService: Send + Sync {
    /// Every user with the reduced field set needed to render post authors.
    fn list_authors(&self) -> Result<Vec<User>>;
    fn load_user(&self, id: u64) -> Result<User>;
}

pub struct ApiPostService {
    client: Arc<api::Client>,
}

impl ApiPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for ApiPostService {
    fn list_posts(&self, skip: u32, limit: u32) -> Result<PostsResponse> {
        self.client
            .posts(limit, skip)
            .with_context(|| format!("fetch posts (skip {skip}, limit {limit})"))
    }

    fn search_posts(&self, query: &str) -> Result<PostsResponse> {
        self.client
            .search_posts(query)
            .with_context(|| format!("search posts for {query:?}"))
    }

    fn posts_by_tag(&self, tag: &str) -> Result<PostsResponse> {
        self.client
            .posts_by_tag(tag)
            .with_context(|| format!("fetch posts tagged {tag:?}"))
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.client.tags().context("fetch tags")
    }

    fn create_post(&self, draft: &NewPost) -> Result<Post> {
        self.client.create_post(draft).context("create post")
    }

    fn update_post(&self, id: u64, patch: &PostPatch) -> Result<Post> {
        self.client
            .update_post(id, patch)
            .with_context(|| format!("update post {id}"))
    }

    fn delete_post(&self, id: u64) -> Result<()> {
        self.client
            .delete_post(id)
            .with_context(|| format!("delete post {id}"))
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        let listing = self
            .client
            .comments(post_id)
            .with_context(|| format!("fetch comments for post {post_id}"))?;
        Ok(listing.comments)
    }

    fn create_comment(&self, draft: &NewCommentBody) -> Result<Comment> {
        self.client
            .create_comment(draft)
            .with_context(|| format!("create comment on post {}", draft.post_id))
    }

    fn update_comment(&self, id: u64, body: &str) -> Result<Comment> {
        let patch = CommentPatch::Body {
            body: body.to_string(),
        };
        self.client
            .update_comment(id, &patch)
            .with_context(|| format!("update comment {id}"))
    }

    fn like_comment(&self, id: u64, likes: u64) -> Result<Comment> {
        self.client
            .update_comment(id, &CommentPatch::Likes { likes })
            .with_context(|| format!("like comment {id}"))
    }

    fn delete_comment(&self, id: u64) -> Result<()> {
        self.client
            .delete_comment(id)
            .with_context(|| format!("delete comment {id}"))
    }
}

pub struct ApiUserService {
    client: Arc<api::Client>,
}

impl ApiUserService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl UserService for ApiUserService {
    fn list_authors(&self) -> Result<Vec<User>> {
        let listing = self
            .client
            .users(0, Some(api::AUTHOR_FIELDS))
            .context("fetch author listing")?;
        Ok(listing.users)
    }

    fn load_user(&self, id: u64) -> Result<User> {
        self.client
            .user(id)
            .with_context(|| format!("fetch user {id}"))
    }
}
