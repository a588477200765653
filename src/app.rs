use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use env_logger::Env;
use log::info;

use crate::api::{self, Comment, User};
use crate::config;
use crate::data::{self, CommentService, PostService, UserService};
use crate::page::{self, PostsPage};
use crate::query::{MemoryHistory, PAGE_SIZES};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Initial location, e.g. `?skip=10&tag=love`.
    pub location: String,
    pub search: Option<String>,
    pub post: Option<u64>,
    pub user: Option<u64>,
    pub config_file: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    init_logging(&cfg.log.level);

    let client = api::Client::new(api::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        base_url: Some(cfg.api.base_url.clone()),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .context("create api client")?;
    info!("using api at {}", client.base_url());
    let client = Arc::new(client);

    let post_service: Arc<dyn PostService + Send + Sync> =
        Arc::new(data::ApiPostService::new(client.clone()));
    let comment_service: Arc<dyn CommentService + Send + Sync> =
        Arc::new(data::ApiCommentService::new(client.clone()));
    let user_service: Arc<dyn UserService + Send + Sync> =
        Arc::new(data::ApiUserService::new(client));

    let mut page = PostsPage::new(page::Options {
        post_service,
        comment_service,
        user_service,
        navigator: Arc::new(MemoryHistory::new(&options.location)),
        location: options.location.clone(),
    });
    // Fetches chain up to two requests, each bounded by the client timeout.
    let wait = cfg.api.timeout * 2 + Duration::from_secs(1);

    page.mount();
    settle(&mut page, wait, "post list")?;

    if let Some(text) = options.search.as_deref() {
        page.set_search_text(text);
        page.search();
        settle(&mut page, wait, "search")?;
    }
    print!("{}", render_posts(&page));

    if let Some(post_id) = options.post {
        page.open_post_detail(post_id);
        settle(&mut page, wait, "comments")?;
        print!("{}", render_comments(post_id, page.comments(post_id)));
    }

    if let Some(user_id) = options.user {
        page.open_user(user_id);
        settle(&mut page, wait, "user profile")?;
        match page.ui().selected_user.as_ref() {
            Some(user) => print!("{}", render_user(user)),
            None => println!("\nUser {user_id} could not be loaded."),
        }
    }

    page.unmount();
    Ok(())
}

fn init_logging(level: &str) {
    let env = Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn settle(page: &mut PostsPage, wait: Duration, what: &str) -> Result<()> {
    if !page.wait_for_idle(wait) {
        bail!("timed out waiting for {what}");
    }
    Ok(())
}

pub(crate) fn render_posts(page: &PostsPage) -> String {
    let mut out = String::new();
    let query = page.query();
    let _ = writeln!(out, "{:>5}  {:<40}  {:<16}  {:>9}  Tags", "Id", "Title", "Author", "Reactions");
    for entry in page.posts() {
        let post = &entry.post;
        let _ = writeln!(
            out,
            "{:>5}  {:<40}  {:<16}  {:>9}  {}",
            post.id,
            truncate(&post.title, 40),
            entry.author_name().unwrap_or("-"),
            format!("{}/{}", post.reactions.likes, post.reactions.dislikes),
            post.tags.join(", "),
        );
    }
    if page.posts().is_empty() {
        let _ = writeln!(out, "  (no posts)");
    }

    let mut footer = format!("{} posts total", page.total());
    if let Some(strategy) = page.active_strategy() {
        let _ = write!(footer, " | {}", strategy.describe());
    }
    if !page.tags().is_empty() {
        let _ = write!(footer, " | {} tags", page.tags().len());
    }
    let _ = write!(footer, " | page size {} of {}", query.limit, page_size_choices());
    let _ = write!(
        footer,
        " | prev: {} next: {}",
        yes_no(page.can_go_back()),
        yes_no(page.can_go_forward())
    );
    let _ = writeln!(out, "{footer}");
    let _ = writeln!(out, "location: {query}");
    out
}

pub(crate) fn render_comments(post_id: u64, comments: Option<&[Comment]>) -> String {
    let mut out = format!("\nComments on post {post_id}:\n");
    match comments {
        None => out.push_str("  (comments could not be loaded)\n"),
        Some([]) => out.push_str("  (no comments)\n"),
        Some(comments) => {
            for comment in comments {
                let _ = writeln!(
                    out,
                    "  #{} {} ({} likes): {}",
                    comment.id, comment.user.username, comment.likes, comment.body
                );
            }
        }
    }
    out
}

pub(crate) fn render_user(user: &User) -> String {
    let mut out = format!("\nUser {} ({})\n", user.id, user.username);
    let name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        let _ = writeln!(out, "  name:    {name}");
    }
    if let Some(age) = user.age {
        let _ = writeln!(out, "  age:     {age}");
    }
    if let Some(email) = &user.email {
        let _ = writeln!(out, "  email:   {email}");
    }
    if let Some(phone) = &user.phone {
        let _ = writeln!(out, "  phone:   {phone}");
    }
    if let Some(address) = &user.address {
        let _ = writeln!(
            out,
            "  address: {}, {}, {}",
            address.address, address.city, address.state
        );
    }
    if let Some(company) = &user.company {
        let _ = writeln!(out, "  company: {} ({})", company.name, company.title);
    }
    out
}

fn page_size_choices() -> String {
    PAGE_SIZES
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
