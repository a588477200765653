use std::io::Read;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use posts_manager::api::{ApiError, Client, ClientConfig, CommentPatch, NewCommentBody, NewPost, PostPatch};
use tiny_http::{Header, Response, Server};

#[derive(Debug)]
struct Recorded {
    method: String,
    url: String,
    body: String,
    user_agent: Option<String>,
}

/// Serves the canned `(status, body)` replies in order, one per request,
/// then shuts down.
fn serve(replies: Vec<(u16, &'static str)>) -> (Client, Receiver<Recorded>, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = unbounded();
    let handle = thread::spawn(move || {
        for (status, reply) in replies {
            let mut req = match server.recv() {
                Ok(req) => req,
                Err(_) => return,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let user_agent = req
                .headers()
                .iter()
                .find(|header| header.field.equiv("User-Agent"))
                .map(|header| header.value.as_str().to_string());
            let _ = tx.send(Recorded {
                method: req.method().to_string(),
                url: req.url().to_string(),
                body,
                user_agent,
            });
            let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let _ = req.respond(
                Response::from_string(reply)
                    .with_status_code(status)
                    .with_header(content_type),
            );
        }
    });
    let client = Client::new(ClientConfig {
        user_agent: "posts-manager-test/1.0".into(),
        base_url: Some(format!("http://{addr}")),
        ..ClientConfig::default()
    })
    .unwrap();
    (client, rx, handle)
}

const POSTS: &str = r#"{"posts":[{"id":1,"title":"His mother had always taught him","body":"...","userId":121,"tags":["history","american"],"reactions":{"likes":192,"dislikes":25},"views":305}],"total":251,"skip":10,"limit":1}"#;

#[test]
fn lists_posts_with_paging_params() {
    let (client, rx, handle) = serve(vec![(200, POSTS)]);
    let page = client.posts(1, 10).unwrap();
    handle.join().unwrap();

    let req = rx.recv().unwrap();
    assert_eq!(req.method, "GET");
    assert_eq!(req.url, "/posts?limit=1&skip=10");
    assert_eq!(req.user_agent.as_deref(), Some("posts-manager-test/1.0"));
    assert_eq!(page.total, 251);
    assert_eq!(page.posts[0].user_id, 121);
    assert_eq!(page.posts[0].reactions.likes, 192);
}

#[test]
fn search_and_tag_paths() {
    let (client, rx, handle) = serve(vec![(200, POSTS), (200, POSTS), (200, r#"[{"slug":"love","name":"Love","url":"https://dummyjson.com/posts/tag/love"}]"#)]);
    client.search_posts("love story").unwrap();
    client.posts_by_tag("french fries").unwrap();
    let tags = client.tags().unwrap();
    handle.join().unwrap();

    assert_eq!(rx.recv().unwrap().url, "/posts/search?q=love+story");
    assert_eq!(rx.recv().unwrap().url, "/posts/tag/french%20fries");
    assert_eq!(rx.recv().unwrap().url, "/posts/tags");
    assert_eq!(tags[0].slug, "love");
}

#[test]
fn post_mutations_send_camel_case_json() {
    let created = r#"{"id":252,"title":"T","body":"B","userId":1}"#;
    let (client, rx, handle) = serve(vec![(201, created), (200, created), (200, r#"{"id":252,"isDeleted":true}"#)]);
    let post = client
        .create_post(&NewPost {
            title: "T".into(),
            body: "B".into(),
            user_id: 1,
        })
        .unwrap();
    client
        .update_post(
            252,
            &PostPatch {
                title: "T".into(),
                body: "B".into(),
            },
        )
        .unwrap();
    client.delete_post(252).unwrap();
    handle.join().unwrap();

    assert_eq!(post.id, 252);
    assert!(post.tags.is_empty());

    let create = rx.recv().unwrap();
    assert_eq!((create.method.as_str(), create.url.as_str()), ("POST", "/posts"));
    let body: serde_json::Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(body, serde_json::json!({"title": "T", "body": "B", "userId": 1}));

    let update = rx.recv().unwrap();
    assert_eq!((update.method.as_str(), update.url.as_str()), ("PUT", "/posts/252"));

    let delete = rx.recv().unwrap();
    assert_eq!((delete.method.as_str(), delete.url.as_str()), ("DELETE", "/posts/252"));
    assert!(delete.body.is_empty());
}

#[test]
fn comment_endpoints() {
    let comment = r#"{"id":1,"body":"Nice","postId":6,"likes":6,"user":{"id":1,"username":"emilys","fullName":"Emily Johnson"}}"#;
    let listing = r#"{"comments":[{"id":1,"body":"Nice","postId":6,"likes":5,"user":{"id":1,"username":"emilys","fullName":"Emily Johnson"}}],"total":1,"skip":0,"limit":1}"#;
    let (client, rx, handle) = serve(vec![(200, listing), (201, comment), (200, comment)]);
    let comments = client.comments(6).unwrap();
    client
        .create_comment(&NewCommentBody {
            body: "Nice".into(),
            post_id: 6,
            user_id: 1,
        })
        .unwrap();
    let liked = client.update_comment(1, &CommentPatch::Likes { likes: 6 }).unwrap();
    handle.join().unwrap();

    assert_eq!(comments.comments[0].user.full_name, "Emily Johnson");
    assert_eq!(liked.likes, 6);

    assert_eq!(rx.recv().unwrap().url, "/comments/post/6");
    let create = rx.recv().unwrap();
    assert_eq!(create.url, "/comments");
    let body: serde_json::Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(body, serde_json::json!({"body": "Nice", "postId": 6, "userId": 1}));
    let like = rx.recv().unwrap();
    assert_eq!((like.method.as_str(), like.url.as_str()), ("PUT", "/comments/1"));
    assert_eq!(like.body, r#"{"likes":6}"#);
}

#[test]
fn users_listing_selects_fields() {
    let listing = r#"{"users":[{"id":1,"username":"emilys","image":"https://dummyjson.com/icon/emilys/128"}],"total":208,"skip":0,"limit":0}"#;
    let (client, rx, handle) = serve(vec![(200, listing)]);
    let users = client.users(0, Some("username,image")).unwrap();
    handle.join().unwrap();

    assert_eq!(rx.recv().unwrap().url, "/users?limit=0&select=username%2Cimage");
    assert_eq!(users.users[0].username, "emilys");
    assert!(users.users[0].email.is_none());
}

#[test]
fn error_status_maps_to_api_error() {
    let (client, _rx, handle) = serve(vec![(404, r#"{"message":"User with id '999' not found"}"#)]);
    let err = client.user(999).unwrap_err();
    handle.join().unwrap();

    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Status { status, path, body, .. }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(path, "users/999");
            assert!(body.contains("not found"));
        }
        _ => panic!("unexpected error: {err:?}"),
    }
}
