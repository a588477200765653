use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error};

use crate::api::{Post, PostsResponse, Tag, User};
use crate::data::PostService;
use crate::query::QueryState;
use crate::users::UserLookup;

/// Which request fills the post table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    List { skip: u32, limit: u32 },
    Tag(String),
    Search(String),
}

impl FetchStrategy {
    /// Reactive path: a tag filter wins over the plain paginated list.
    /// Search never comes from here, it needs an explicit trigger.
    pub fn for_query(query: &QueryState) -> Self {
        match &query.tag {
            Some(tag) => FetchStrategy::Tag(tag.clone()),
            None => FetchStrategy::List {
                skip: query.skip,
                limit: query.limit,
            },
        }
    }

    /// Explicit search; an empty query falls back to the reactive path.
    pub fn for_search(query: &QueryState) -> Self {
        let text = query.search.trim();
        if text.is_empty() {
            Self::for_query(query)
        } else {
            FetchStrategy::Search(text.to_string())
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FetchStrategy::List { skip, limit } => format!("posts (skip {skip}, limit {limit})"),
            FetchStrategy::Tag(tag) => format!("posts tagged {tag:?}"),
            FetchStrategy::Search(query) => format!("posts matching {query:?}"),
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(self, FetchStrategy::Search(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author: Option<Arc<User>>,
}

impl PostWithAuthor {
    pub fn id(&self) -> u64 {
        self.post.id
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_deref().map(|author| author.username.as_str())
    }
}

/// Everything one strategy run brings back.
#[derive(Debug, Clone)]
pub struct PostBatch {
    pub page: PostsResponse,
    pub authors: Vec<Arc<User>>,
}

/// Runs a strategy: the matching posts plus the author listing.
pub fn fetch_batch(
    posts: &dyn PostService,
    users: &UserLookup,
    strategy: &FetchStrategy,
) -> Result<PostBatch> {
    let page = match strategy {
        FetchStrategy::List { skip, limit } => posts.list_posts(*skip, *limit)?,
        FetchStrategy::Tag(tag) => posts.posts_by_tag(tag)?,
        FetchStrategy::Search(query) => posts.search_posts(query)?,
    };
    let authors = users.fetch_authors().context("load authors for post join")?;
    Ok(PostBatch { page, authors })
}

/// Associates each post with the author whose id equals its `user_id`.
pub fn join_authors(posts: Vec<Post>, authors: &[Arc<User>]) -> Vec<PostWithAuthor> {
    posts
        .into_iter()
        .map(|post| {
            let author = find_author(authors, post.user_id);
            PostWithAuthor { post, author }
        })
        .collect()
}

fn find_author(authors: &[Arc<User>], user_id: u64) -> Option<Arc<User>> {
    authors
        .iter()
        .find(|author| author.id == user_id)
        .cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
}

/// The post table: current page, server total, loading flag and the
/// generation counter that keeps older responses from overwriting newer
/// ones.
#[derive(Debug, Default)]
pub struct PostCollection {
    posts: Vec<PostWithAuthor>,
    total: u64,
    loading: bool,
    generation: u64,
    active: Option<FetchStrategy>,
    authors: Vec<Arc<User>>,
    tags: Option<Vec<Tag>>,
}

impl PostCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[PostWithAuthor] {
        &self.posts
    }

    pub fn get(&self, id: u64) -> Option<&PostWithAuthor> {
        self.posts.iter().find(|entry| entry.post.id == id)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Strategy of the request currently shown or in flight.
    pub fn active_strategy(&self) -> Option<&FetchStrategy> {
        self.active.as_ref()
    }

    pub fn authors(&self) -> &[Arc<User>] {
        &self.authors
    }

    /// Marks a new fetch as the current one. Raises the loading flag
    /// before the request is issued.
    pub fn begin(&mut self, strategy: FetchStrategy) -> FetchTicket {
        self.generation = self.generation.wrapping_add(1);
        self.loading = true;
        debug!(
            "begin fetch #{}: {}",
            self.generation,
            strategy.describe()
        );
        self.active = Some(strategy);
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Applies a finished fetch. Returns false when the result belongs to
    /// a superseded generation and was dropped.
    pub fn complete(&mut self, generation: u64, result: Result<PostBatch>) -> bool {
        if generation != self.generation {
            debug!(
                "dropping stale post response #{generation} (current #{})",
                self.generation
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(batch) => {
                self.total = batch.page.total;
                self.posts = join_authors(batch.page.posts, &batch.authors);
                self.authors = batch.authors;
            }
            Err(err) => {
                let what = self
                    .active
                    .as_ref()
                    .map(FetchStrategy::describe)
                    .unwrap_or_else(|| "posts".to_string());
                error!("failed to load {what}: {err:#}");
            }
        }
        true
    }

    /// Puts a freshly created post at the top. `total` stays at the
    /// server's value.
    pub fn prepend(&mut self, post: Post) {
        let author = find_author(&self.authors, post.user_id);
        self.posts.insert(0, PostWithAuthor { post, author });
    }

    /// Swaps the entry with the same id in place. Returns false when the
    /// post is not on the current page.
    pub fn replace(&mut self, post: Post) -> bool {
        let author = find_author(&self.authors, post.user_id);
        match self.posts.iter_mut().find(|entry| entry.post.id == post.id) {
            Some(entry) => {
                *entry = PostWithAuthor { post, author };
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.posts.len();
        self.posts.retain(|entry| entry.post.id != id);
        self.posts.len() != before
    }

    pub fn tags(&self) -> &[Tag] {
        self.tags.as_deref().unwrap_or_default()
    }

    pub fn tags_loaded(&self) -> bool {
        self.tags.is_some()
    }

    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = Some(tags);
    }

    /// Drops everything. The generation keeps counting so responses from
    /// before the reset are still recognised as stale.
    pub fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = PostCollection {
            generation,
            ..PostCollection::default()
        };
    }
}
