use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com/";

/// Field set requested for the bulk author listing used by the table join.
pub const AUTHOR_FIELDS: &str = "username,image";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: {method} {path} failed with status {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("api: invalid client configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(ApiError::Config("user agent required".into()).into());
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn posts(&self, limit: u32, skip: u32) -> Result<PostsResponse> {
        let params = [
            ("limit".to_string(), limit.to_string()),
            ("skip".to_string(), skip.to_string()),
        ];
        self.get_json("posts", &params)
    }

    pub fn search_posts(&self, query: &str) -> Result<PostsResponse> {
        let params = [("q".to_string(), query.to_string())];
        self.get_json("posts/search", &params)
    }

    pub fn posts_by_tag(&self, tag: &str) -> Result<PostsResponse> {
        if tag.trim().is_empty() {
            bail!("api: tag is required");
        }
        let path = format!("posts/tag/{}", encode_segment(tag));
        self.get_json(&path, &[])
    }

    pub fn tags(&self) -> Result<Vec<Tag>> {
        self.get_json("posts/tags", &[])
    }

    pub fn create_post(&self, draft: &NewPost) -> Result<Post> {
        let resp = self.request(Method::POST, "posts", &[], Some(draft))?;
        resp.json().context("api: decode created post")
    }

    pub fn update_post(&self, id: u64, edit: &PostPatch) -> Result<Post> {
        let path = format!("posts/{id}");
        let resp = self.request(Method::PUT, &path, &[], Some(edit))?;
        resp.json().context("api: decode updated post")
    }

    pub fn delete_post(&self, id: u64) -> Result<()> {
        let path = format!("posts/{id}");
        self.request::<()>(Method::DELETE, &path, &[], None)?;
        Ok(())
    }

    pub fn comments(&self, post_id: u64) -> Result<CommentsResponse> {
        let path = format!("comments/post/{post_id}");
        self.get_json(&path, &[])
    }

    pub fn create_comment(&self, draft: &NewCommentBody) -> Result<Comment> {
        let resp = self.request(Method::POST, "comments", &[], Some(draft))?;
        resp.json().context("api: decode created comment")
    }

    pub fn update_comment(&self, id: u64, patch: &CommentPatch) -> Result<Comment> {
        let path = format!("comments/{id}");
        let resp = self.request(Method::PUT, &path, &[], Some(patch))?;
        resp.json().context("api: decode updated comment")
    }

    pub fn delete_comment(&self, id: u64) -> Result<()> {
        let path = format!("comments/{id}");
        self.request::<()>(Method::DELETE, &path, &[], None)?;
        Ok(())
    }

    pub fn users(&self, limit: u32, select: Option<&str>) -> Result<UsersResponse> {
        let mut params = vec![("limit".to_string(), limit.to_string())];
        if let Some(select) = select.filter(|s| !s.is_empty()) {
            params.push(("select".to_string(), select.to_string()));
        }
        self.get_json("users", &params)
    }

    pub fn user(&self, id: u64) -> Result<User> {
        let path = format!("users/{id}");
        self.get_json(&path, &[])
    }

    fn get_json<T>(&self, path: &str, params: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.request::<()>(Method::GET, path, params, None)?;
        resp.json()
            .with_context(|| format!("api: decode response from {path}"))
    }

    fn request<B>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self.http.request(method.clone(), url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        req = req.header(ACCEPT, "application/json");
        if let Some(payload) = body {
            req = req.json(payload);
        }

        let resp = req.send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            Err(ApiError::Status {
                method,
                path: path.to_string(),
                status,
                body,
            }
            .into())
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    // Url::join drops the last segment unless the base ends with a slash.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized)
        .map_err(|err| ApiError::Config(format!("invalid base url {raw:?}: {err}")).into())
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsResponse {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUser {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub post_id: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub user: CommentUser,
}

impl Comment {
    pub fn user_id(&self) -> u64 {
        self.user.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
}

/// A user record. The author listing only fills `username` and `image`;
/// the profile endpoint fills the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub company: Option<Company>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub user_id: u64,
}

impl Default for NewPost {
    fn default() -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            user_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostPatch {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentBody {
    pub body: String,
    pub post_id: u64,
    pub user_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommentPatch {
    Body { body: String },
    Likes { likes: u64 },
}
