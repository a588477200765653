//! In-memory service doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;

use crate::api::{
    Comment, CommentUser, NewCommentBody, NewPost, Post, PostPatch, PostsResponse, Reactions,
    Tag, User,
};
use crate::data::{CommentService, PostService, UserService};

pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    posts: Vec<Post>,
    users: Vec<User>,
    comments: Vec<Comment>,
    tags: Vec<Tag>,
    next_post_id: u64,
    next_comment_id: u64,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
    delays: HashMap<String, Duration>,
}

pub(crate) fn post(id: u64, user_id: u64, tag: &str) -> Post {
    Post {
        id,
        title: format!("Post {id}"),
        body: format!("Body of post {id}"),
        user_id,
        tags: vec![tag.to_string()],
        reactions: Reactions {
            likes: id,
            dislikes: 0,
        },
        views: 0,
    }
}

pub(crate) fn user(id: u64, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        image: format!("https://img.example/{username}.png"),
        ..User::default()
    }
}

pub(crate) fn comment(id: u64, post_id: u64, likes: u64) -> Comment {
    Comment {
        id,
        body: format!("Comment {id}"),
        post_id,
        likes,
        user: CommentUser {
            id: 1,
            username: "emilys".into(),
            full_name: "Emily Johnson".into(),
        },
    }
}

impl FakeBackend {
    /// Thirty posts (even ids tagged "tech", odd ids "love"), authored by
    /// users 1, 2 and a missing user 3; two comments on post 1.
    pub(crate) fn seeded() -> Self {
        let posts = (1..=30)
            .map(|id| post(id, (id - 1) % 3 + 1, if id % 2 == 0 { "tech" } else { "love" }))
            .collect();
        let state = FakeState {
            posts,
            users: vec![user(1, "emilys"), user(2, "michaelw")],
            comments: vec![comment(1, 1, 5), comment(2, 1, 0)],
            tags: vec![
                Tag {
                    slug: "love".into(),
                    name: "Love".into(),
                    url: "https://dummyjson.com/posts/tag/love".into(),
                },
                Tag {
                    slug: "tech".into(),
                    name: "Tech".into(),
                    url: "https://dummyjson.com/posts/tag/tech".into(),
                },
            ],
            next_post_id: 101,
            next_comment_id: 341,
            ..FakeState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn calls(&self, name: &str) -> usize {
        let prefix = format!("{name}:");
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| *call == name || call.starts_with(&prefix))
            .count()
    }

    pub(crate) fn fail(&self, name: &'static str) {
        self.state.lock().failing.insert(name);
    }

    pub(crate) fn recover(&self, name: &'static str) {
        self.state.lock().failing.remove(name);
    }

    /// Delays calls whose log entry equals `call`, e.g. `posts_by_tag:love`.
    pub(crate) fn delay(&self, call: &str, duration: Duration) {
        self.state.lock().delays.insert(call.to_string(), duration);
    }

    fn enter(&self, name: &'static str, arg: Option<String>) -> Result<()> {
        let entry = match arg {
            Some(arg) => format!("{name}:{arg}"),
            None => name.to_string(),
        };
        let (failing, delay) = {
            let mut state = self.state.lock();
            state.calls.push(entry.clone());
            (
                state.failing.contains(name),
                state.delays.get(&entry).copied(),
            )
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if failing {
            bail!("fake: {name} failed");
        }
        Ok(())
    }
}

impl PostService for FakeBackend {
    fn list_posts(&self, skip: u32, limit: u32) -> Result<PostsResponse> {
        self.enter("list_posts", Some(format!("{skip}/{limit}")))?;
        let state = self.state.lock();
        let posts = state
            .posts
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(PostsResponse {
            posts,
            total: state.posts.len() as u64,
            skip: u64::from(skip),
            limit: u64::from(limit),
        })
    }

    fn search_posts(&self, query: &str) -> Result<PostsResponse> {
        self.enter("search_posts", Some(query.to_string()))?;
        let state = self.state.lock();
        let needle = query.to_lowercase();
        let posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| post.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        let total = posts.len() as u64;
        Ok(PostsResponse {
            posts,
            total,
            skip: 0,
            limit: total,
        })
    }

    fn posts_by_tag(&self, tag: &str) -> Result<PostsResponse> {
        self.enter("posts_by_tag", Some(tag.to_string()))?;
        let state = self.state.lock();
        let posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| post.tags.iter().any(|candidate| candidate == tag))
            .cloned()
            .collect();
        let total = posts.len() as u64;
        Ok(PostsResponse {
            posts,
            total,
            skip: 0,
            limit: total,
        })
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.enter("list_tags", None)?;
        Ok(self.state.lock().tags.clone())
    }

    fn create_post(&self, draft: &NewPost) -> Result<Post> {
        self.enter("create_post", None)?;
        let mut state = self.state.lock();
        let id = state.next_post_id;
        state.next_post_id += 1;
        Ok(Post {
            id,
            title: draft.title.clone(),
            body: draft.body.clone(),
            user_id: draft.user_id,
            tags: Vec::new(),
            reactions: Reactions::default(),
            views: 0,
        })
    }

    fn update_post(&self, id: u64, patch: &PostPatch) -> Result<Post> {
        self.enter("update_post", Some(id.to_string()))?;
        let state = self.state.lock();
        let mut post = state
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("fake: post {id} not found"))?;
        post.title = patch.title.clone();
        post.body = patch.body.clone();
        Ok(post)
    }

    fn delete_post(&self, id: u64) -> Result<()> {
        self.enter("delete_post", Some(id.to_string()))
    }
}

impl CommentService for FakeBackend {
    fn load_comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        self.enter("load_comments", Some(post_id.to_string()))?;
        let state = self.state.lock();
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    fn create_comment(&self, draft: &NewCommentBody) -> Result<Comment> {
        self.enter("create_comment", Some(draft.post_id.to_string()))?;
        let mut state = self.state.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        let username = state
            .users
            .iter()
            .find(|user| user.id == draft.user_id)
            .map(|user| user.username.clone())
            .unwrap_or_default();
        Ok(Comment {
            id,
            body: draft.body.clone(),
            post_id: draft.post_id,
            likes: 0,
            user: CommentUser {
                id: draft.user_id,
                username,
                full_name: String::new(),
            },
        })
    }

    fn update_comment(&self, id: u64, body: &str) -> Result<Comment> {
        self.enter("update_comment", Some(id.to_string()))?;
        let mut state = self.state.lock();
        let comment = state
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or_else(|| anyhow!("fake: comment {id} not found"))?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }

    fn like_comment(&self, id: u64, likes: u64) -> Result<Comment> {
        self.enter("like_comment", Some(id.to_string()))?;
        let mut state = self.state.lock();
        let comment = state
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or_else(|| anyhow!("fake: comment {id} not found"))?;
        comment.likes = likes;
        Ok(comment.clone())
    }

    fn delete_comment(&self, id: u64) -> Result<()> {
        self.enter("delete_comment", Some(id.to_string()))
    }
}

impl UserService for FakeBackend {
    fn list_authors(&self) -> Result<Vec<User>> {
        self.enter("list_authors", None)?;
        Ok(self.state.lock().users.clone())
    }

    fn load_user(&self, id: u64) -> Result<User> {
        self.enter("load_user", Some(id.to_string()))?;
        self.state
            .lock()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("fake: user {id} not found"))
    }
}
