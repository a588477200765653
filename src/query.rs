//! Query state for the posts page and its mapping to the URL query string.
//!
//! The store has two one-directional paths. User setters change state and
//! hand back the query string to push; [`QueryStateStore::apply_location`]
//! takes state from a navigation event and never produces a push. Keeping
//! the two sources apart is what stops a push from echoing back as a
//! navigation and vice versa.

use std::fmt;

use log::warn;
use parking_lot::Mutex;
use url::form_urlencoded;

pub const DEFAULT_LIMIT: u32 = 10;
/// Choices offered by the page-size selector. A location may still carry
/// any positive limit.
pub const PAGE_SIZES: [u32; 3] = [10, 20, 30];

/// Tag value the tag selector uses for "no filter".
pub const ALL_TAGS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortBy {
    #[default]
    None,
    Id,
    Title,
    Reactions,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::None => "none",
            SortBy::Id => "id",
            SortBy::Title => "title",
            SortBy::Reactions => "reactions",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "none" => Some(SortBy::None),
            "id" => Some(SortBy::Id),
            "title" => Some(SortBy::Title),
            "reactions" => Some(SortBy::Reactions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub skip: u32,
    pub limit: u32,
    pub search: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// `None` is the unfiltered list ("all").
    pub tag: Option<String>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            search: String::new(),
            sort_by: SortBy::None,
            sort_order: SortOrder::Asc,
            tag: None,
        }
    }
}

impl QueryState {
    /// Parses a location query string such as `?skip=10&tag=love`.
    /// Unknown keys are ignored and bad values fall back to defaults.
    pub fn from_query(query: &str) -> Self {
        let mut state = QueryState::default();
        let raw = query.trim().trim_start_matches('?');
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "skip" => state.skip = value.parse().unwrap_or(0),
                "limit" => {
                    state.limit = value
                        .parse()
                        .ok()
                        .filter(|limit: &u32| *limit > 0)
                        .unwrap_or(DEFAULT_LIMIT)
                }
                "search" => state.search = value.into_owned(),
                "sortBy" => state.sort_by = SortBy::parse(&value).unwrap_or_default(),
                "sortOrder" => state.sort_order = SortOrder::parse(&value).unwrap_or_default(),
                "tag" => state.tag = normalize_tag(&value),
                _ => {}
            }
        }
        state
    }

    /// Serializes the full state, leaving out fields at their default.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if self.skip != 0 {
            serializer.append_pair("skip", &self.skip.to_string());
        }
        if self.limit != DEFAULT_LIMIT {
            serializer.append_pair("limit", &self.limit.to_string());
        }
        if !self.search.is_empty() {
            serializer.append_pair("search", &self.search);
        }
        if self.sort_by != SortBy::None {
            serializer.append_pair("sortBy", self.sort_by.as_str());
        }
        if self.sort_order != SortOrder::Asc {
            serializer.append_pair("sortOrder", self.sort_order.as_str());
        }
        if let Some(tag) = &self.tag {
            serializer.append_pair("tag", tag);
        }
        serializer.finish()
    }

    /// The location pushed to history: `?` plus the query, or just `?`.
    pub fn to_location(&self) -> String {
        format!("?{}", self.to_query())
    }

    pub fn can_go_back(&self) -> bool {
        self.skip > 0
    }

    pub fn can_go_forward(&self, total: u64) -> bool {
        u64::from(self.skip) + u64::from(self.limit) < total
    }

    /// Compares the fields whose change triggers a list refetch.
    pub fn same_reactive_fields(&self, other: &QueryState) -> bool {
        self.skip == other.skip
            && self.limit == other.limit
            && self.sort_by == other.sort_by
            && self.sort_order == other.sort_order
            && self.tag == other.tag
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_location())
    }
}

fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == ALL_TAGS {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryStateStore {
    state: QueryState,
}

impl QueryStateStore {
    pub fn new(state: QueryState) -> Self {
        Self { state }
    }

    pub fn from_location(location: &str) -> Self {
        Self::new(QueryState::from_query(location))
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Navigation path: overwrite state from the URL. Returns whether a
    /// field that drives the list fetch changed. Never asks for a push.
    pub fn apply_location(&mut self, location: &str) -> bool {
        let next = QueryState::from_query(location);
        let changed = !self.state.same_reactive_fields(&next);
        self.state = next;
        changed
    }

    pub fn set_skip(&mut self, skip: u32) -> Option<String> {
        if self.state.skip == skip {
            return None;
        }
        self.state.skip = skip;
        Some(self.state.to_location())
    }

    pub fn set_limit(&mut self, limit: u32) -> Option<String> {
        if limit == 0 {
            warn!("ignoring page size of zero");
            return None;
        }
        if self.state.limit == limit {
            return None;
        }
        self.state.limit = limit;
        Some(self.state.to_location())
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) -> Option<String> {
        if self.state.sort_by == sort_by {
            return None;
        }
        self.state.sort_by = sort_by;
        Some(self.state.to_location())
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) -> Option<String> {
        if self.state.sort_order == sort_order {
            return None;
        }
        self.state.sort_order = sort_order;
        Some(self.state.to_location())
    }

    /// Accepts a tag slug; "all" and the empty string clear the filter.
    pub fn set_tag(&mut self, tag: &str) -> Option<String> {
        let tag = normalize_tag(tag);
        if self.state.tag == tag {
            return None;
        }
        self.state.tag = tag;
        Some(self.state.to_location())
    }

    /// Keystroke path: updates the text only, nothing is pushed.
    pub fn set_search(&mut self, text: &str) {
        self.state.search = text.to_string();
    }

    pub fn next_page(&mut self) -> Option<String> {
        let skip = self.state.skip.saturating_add(self.state.limit);
        self.set_skip(skip)
    }

    pub fn prev_page(&mut self) -> Option<String> {
        let skip = self.state.skip.saturating_sub(self.state.limit);
        self.set_skip(skip)
    }
}

/// Routing collaborator: receives locations pushed by the page.
pub trait Navigator: Send + Sync {
    fn push(&self, location: &str);
}

/// Browser-style history kept in memory.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<HistoryStack>,
}

#[derive(Debug)]
struct HistoryStack {
    entries: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            inner: Mutex::new(HistoryStack {
                entries: vec![initial.to_string()],
                index: 0,
            }),
        }
    }

    pub fn current(&self) -> String {
        let stack = self.inner.lock();
        stack.entries[stack.index].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Steps back and returns the location to hand to the page, if any.
    pub fn back(&self) -> Option<String> {
        let mut stack = self.inner.lock();
        if stack.index == 0 {
            return None;
        }
        stack.index -= 1;
        Some(stack.entries[stack.index].clone())
    }

    pub fn forward(&self) -> Option<String> {
        let mut stack = self.inner.lock();
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        Some(stack.entries[stack.index].clone())
    }
}

impl Navigator for MemoryHistory {
    fn push(&self, location: &str) {
        let mut stack = self.inner.lock();
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(location.to_string());
        stack.index = stack.entries.len() - 1;
    }
}
