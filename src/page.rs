use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::api::{Comment, NewPost, Tag, User};
use crate::comments::CommentCache;
use crate::data::{CommentService, PostService, UserService};
use crate::mutation::{
    self, CommentEdit, Mutation, MutationCoordinator, MutationOutcome, NewComment, PostEdit,
};
use crate::posts::{self, FetchStrategy, PostBatch, PostCollection, PostWithAuthor};
use crate::query::{Navigator, QueryState, QueryStateStore, SortBy, SortOrder};
use crate::users::UserLookup;

pub struct Options {
    pub post_service: Arc<dyn PostService + Send + Sync>,
    pub comment_service: Arc<dyn CommentService + Send + Sync>,
    pub user_service: Arc<dyn UserService + Send + Sync>,
    pub navigator: Arc<dyn Navigator>,
    /// Location the page is mounted at, e.g. `?skip=10&tag=love`.
    pub location: String,
}

/// Dialog visibility, selections and form drafts. Kept apart from the
/// query state, which is what ends up in the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub show_add_post: bool,
    pub show_edit_post: bool,
    pub show_add_comment: bool,
    pub show_edit_comment: bool,
    pub show_post_detail: bool,
    pub show_user_profile: bool,
    pub selected_post: Option<u64>,
    pub selected_user: Option<User>,
    pub new_post: NewPost,
    pub editing_post: Option<PostEdit>,
    pub new_comment: NewComment,
    pub editing_comment: Option<CommentEdit>,
}

struct PendingUser {
    request_id: u64,
}

enum AsyncResponse {
    Posts {
        generation: u64,
        result: Result<PostBatch>,
    },
    Tags {
        epoch: u64,
        result: Result<Vec<Tag>>,
    },
    Comments {
        epoch: u64,
        post_id: u64,
        result: Result<Vec<Comment>>,
    },
    User {
        request_id: u64,
        result: Result<User>,
    },
    Mutation {
        epoch: u64,
        mutation: Mutation,
        result: Result<MutationOutcome>,
    },
}

/// The posts manager page. Network calls run on worker threads; their
/// results come back over a channel and are applied only by the owner,
/// inside [`PostsPage::poll_async`] or [`PostsPage::wait_for_idle`].
pub struct PostsPage {
    query: QueryStateStore,
    posts: PostCollection,
    comments: CommentCache,
    ui: UiState,
    post_service: Arc<dyn PostService + Send + Sync>,
    comment_service: Arc<dyn CommentService + Send + Sync>,
    users: UserLookup,
    mutations: MutationCoordinator,
    navigator: Arc<dyn Navigator>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    pending_user: Option<PendingUser>,
    tags_requested: bool,
    outstanding: usize,
    mounted: bool,
    /// Bumped by every unmount; tags, comment and mutation responses from an
    /// earlier mount are dropped.
    epoch: u64,
}

impl PostsPage {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            query: QueryStateStore::from_location(&options.location),
            posts: PostCollection::new(),
            comments: CommentCache::new(),
            ui: UiState::default(),
            post_service: options.post_service.clone(),
            comment_service: options.comment_service.clone(),
            users: UserLookup::new(options.user_service),
            mutations: MutationCoordinator::new(options.post_service, options.comment_service),
            navigator: options.navigator,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending_user: None,
            tags_requested: false,
            outstanding: 0,
            mounted: false,
            epoch: 0,
        }
    }

    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        info!("mounting posts page at {}", self.query.state());
        self.load_tags();
        self.refresh();
    }

    /// Drops every collection and the UI state. Responses still in flight
    /// are ignored when they arrive.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.epoch = self.epoch.wrapping_add(1);
        self.posts.reset();
        self.comments.clear();
        self.ui = UiState::default();
        self.pending_user = None;
        self.tags_requested = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn query(&self) -> &QueryState {
        self.query.state()
    }

    pub fn posts(&self) -> &[PostWithAuthor] {
        self.posts.posts()
    }

    pub fn total(&self) -> u64 {
        self.posts.total()
    }

    pub fn is_loading(&self) -> bool {
        self.posts.is_loading()
    }

    pub fn active_strategy(&self) -> Option<&FetchStrategy> {
        self.posts.active_strategy()
    }

    pub fn tags(&self) -> &[Tag] {
        self.posts.tags()
    }

    pub fn comments(&self, post_id: u64) -> Option<&[Comment]> {
        self.comments.get(post_id)
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiState {
        &mut self.ui
    }

    pub fn selected_post(&self) -> Option<&PostWithAuthor> {
        self.ui.selected_post.and_then(|id| self.posts.get(id))
    }

    pub fn can_go_back(&self) -> bool {
        self.query.state().can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.query.state().can_go_forward(self.posts.total())
    }

    /// Browser back/forward. Overwrites the query state from the URL and
    /// refetches when needed; nothing is pushed.
    pub fn on_navigation(&mut self, location: &str) {
        if self.query.apply_location(location) {
            debug!("navigated to {location}");
            self.refresh();
        }
    }

    pub fn set_skip(&mut self, skip: u32) {
        let push = self.query.set_skip(skip);
        self.after_user_change(push);
    }

    pub fn set_limit(&mut self, limit: u32) {
        let push = self.query.set_limit(limit);
        self.after_user_change(push);
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) {
        let push = self.query.set_sort_by(sort_by);
        self.after_user_change(push);
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) {
        let push = self.query.set_sort_order(sort_order);
        self.after_user_change(push);
    }

    /// Selects a tag ("all" or "" clears it). Replaces any search results.
    pub fn set_tag(&mut self, tag: &str) {
        let push = self.query.set_tag(tag);
        self.after_user_change(push);
    }

    pub fn next_page(&mut self) {
        if !self.can_go_forward() {
            return;
        }
        let push = self.query.next_page();
        self.after_user_change(push);
    }

    pub fn prev_page(&mut self) {
        if !self.can_go_back() {
            return;
        }
        let push = self.query.prev_page();
        self.after_user_change(push);
    }

    /// Search box keystrokes: no fetch and no URL update.
    pub fn set_search_text(&mut self, text: &str) {
        self.query.set_search(text);
    }

    /// Explicit search trigger (enter in the search box).
    pub fn search(&mut self) {
        let strategy = FetchStrategy::for_search(self.query.state());
        self.start_fetch(strategy);
    }

    /// Runs the reactive fetch for the current query state.
    pub fn refresh(&mut self) {
        let strategy = FetchStrategy::for_query(self.query.state());
        self.start_fetch(strategy);
    }

    pub fn open_post_detail(&mut self, post_id: u64) {
        self.ui.selected_post = Some(post_id);
        self.ensure_comments_loaded(post_id);
        self.ui.show_post_detail = true;
    }

    pub fn close_post_detail(&mut self) {
        self.ui.show_post_detail = false;
    }

    pub fn ensure_comments_loaded(&mut self, post_id: u64) {
        if !self.comments.ensure_loaded(post_id) {
            return;
        }
        let service = self.comment_service.clone();
        let epoch = self.epoch;
        self.spawn(move || AsyncResponse::Comments {
            epoch,
            post_id,
            result: service.load_comments(post_id),
        });
    }

    /// Fetches the full profile for the user dialog. Always hits the
    /// network.
    pub fn open_user(&mut self, user_id: u64) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_user = Some(PendingUser { request_id });
        let users = self.users.clone();
        self.spawn(move || AsyncResponse::User {
            request_id,
            result: users.fetch_one(user_id),
        });
    }

    pub fn close_user_profile(&mut self) {
        self.ui.show_user_profile = false;
        self.ui.selected_user = None;
    }

    pub fn open_add_post(&mut self) {
        self.ui.show_add_post = true;
    }

    pub fn add_post(&mut self) {
        let draft = self.ui.new_post.clone();
        self.dispatch(Mutation::CreatePost(draft));
    }

    pub fn begin_edit_post(&mut self, post_id: u64) {
        let Some(entry) = self.posts.get(post_id) else {
            warn!("post {post_id} is not on the current page");
            return;
        };
        self.ui.editing_post = Some(PostEdit::from_post(&entry.post));
        self.ui.show_edit_post = true;
    }

    pub fn update_post(&mut self) {
        let Some(edit) = self.ui.editing_post.clone() else {
            warn!("no post is being edited");
            return;
        };
        self.dispatch(Mutation::UpdatePost(edit));
    }

    pub fn delete_post(&mut self, post_id: u64) {
        self.dispatch(Mutation::DeletePost(post_id));
    }

    pub fn open_add_comment(&mut self, post_id: u64) {
        self.ui.new_comment = NewComment::for_post(post_id);
        self.ui.show_add_comment = true;
    }

    pub fn add_comment(&mut self) {
        let Some(request) = self.ui.new_comment.to_request() else {
            warn!("comment draft has no post");
            return;
        };
        self.dispatch(Mutation::CreateComment(request));
    }

    pub fn begin_edit_comment(&mut self, comment_id: u64, post_id: u64) {
        let Some(comment) = self.comments.find(comment_id, post_id) else {
            warn!("comment {comment_id} is not cached for post {post_id}");
            return;
        };
        self.ui.editing_comment = Some(CommentEdit::from_comment(comment));
        self.ui.show_edit_comment = true;
    }

    pub fn update_comment(&mut self) {
        let Some(edit) = self.ui.editing_comment.clone() else {
            warn!("no comment is being edited");
            return;
        };
        self.dispatch(Mutation::UpdateComment(edit));
    }

    pub fn delete_comment(&mut self, comment_id: u64, post_id: u64) {
        self.dispatch(Mutation::DeleteComment {
            id: comment_id,
            post_id,
        });
    }

    pub fn like_comment(&mut self, comment_id: u64, post_id: u64) {
        match Mutation::like(&self.comments, comment_id, post_id) {
            Some(mutation) => self.dispatch(mutation),
            None => warn!("comment {comment_id} is not cached for post {post_id}"),
        }
    }

    /// Applies every response that has already arrived. Never blocks.
    pub fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    /// Blocks until every request issued so far has settled, or the
    /// timeout passes. Returns whether the page went idle.
    pub fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(message) => self.handle_async_response(message),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    pub fn has_pending_work(&self) -> bool {
        self.outstanding > 0
    }

    fn after_user_change(&mut self, push: Option<String>) {
        let Some(location) = push else {
            return;
        };
        self.navigator.push(&location);
        self.refresh();
    }

    fn load_tags(&mut self) {
        if self.posts.tags_loaded() || self.tags_requested {
            return;
        }
        self.tags_requested = true;
        let service = self.post_service.clone();
        let epoch = self.epoch;
        self.spawn(move || AsyncResponse::Tags {
            epoch,
            result: service.list_tags(),
        });
    }

    fn start_fetch(&mut self, strategy: FetchStrategy) {
        let ticket = self.posts.begin(strategy.clone());
        let service = self.post_service.clone();
        let users = self.users.clone();
        self.spawn(move || AsyncResponse::Posts {
            generation: ticket.generation,
            result: posts::fetch_batch(service.as_ref(), &users, &strategy),
        });
    }

    fn dispatch(&mut self, mutation: Mutation) {
        debug!("dispatching {mutation}");
        let coordinator = self.mutations.clone();
        let epoch = self.epoch;
        self.spawn(move || {
            let result = coordinator.execute(&mutation);
            AsyncResponse::Mutation {
                epoch,
                mutation,
                result,
            }
        });
    }

    fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce() -> AsyncResponse + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match message {
            AsyncResponse::Posts { generation, result } => {
                self.posts.complete(generation, result);
            }
            AsyncResponse::Tags { epoch, result } => {
                if !self.is_current(epoch) {
                    debug!("dropping tags from an earlier mount");
                    return;
                }
                self.tags_requested = false;
                match result {
                    Ok(tags) => self.posts.set_tags(tags),
                    Err(err) => error!("failed to load tags: {err:#}"),
                }
            }
            AsyncResponse::Comments {
                epoch,
                post_id,
                result,
            } => {
                if !self.is_current(epoch) {
                    debug!("dropping comments for post {post_id} from an earlier mount");
                    return;
                }
                self.comments.finish_load(post_id, result);
            }
            AsyncResponse::User { request_id, result } => {
                let Some(pending) = &self.pending_user else {
                    return;
                };
                if pending.request_id != request_id {
                    return;
                }
                self.pending_user = None;
                match result {
                    Ok(user) => {
                        self.ui.selected_user = Some(user);
                        self.ui.show_user_profile = true;
                    }
                    Err(err) => error!("failed to load user profile: {err:#}"),
                }
            }
            AsyncResponse::Mutation {
                epoch,
                mutation,
                result,
            } => {
                if !self.is_current(epoch) {
                    debug!("ignoring result of {mutation} from an earlier mount");
                    return;
                }
                match result {
                    Ok(outcome) => {
                        self.close_form_for(&outcome);
                        mutation::apply(outcome, &mut self.posts, &mut self.comments);
                    }
                    Err(err) => error!("failed to {mutation}: {err:#}"),
                }
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.mounted && epoch == self.epoch
    }

    fn close_form_for(&mut self, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::PostCreated(_) => {
                self.ui.show_add_post = false;
                self.ui.new_post = NewPost::default();
            }
            MutationOutcome::PostUpdated(_) => {
                self.ui.show_edit_post = false;
                self.ui.editing_post = None;
            }
            MutationOutcome::CommentCreated(_) => {
                self.ui.show_add_comment = false;
                self.ui.new_comment = NewComment::default();
            }
            MutationOutcome::CommentUpdated(_) => {
                self.ui.show_edit_comment = false;
                self.ui.editing_comment = None;
            }
            MutationOutcome::PostDeleted(_)
            | MutationOutcome::CommentDeleted { .. }
            | MutationOutcome::CommentLiked(_) => {}
        }
    }
}
