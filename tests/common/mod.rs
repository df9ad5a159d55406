#![allow(dead_code)]

use std::io::Cursor;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, Response, StatusCode},
    Router,
};
use bookshelf_app::{modules::accounts::create_account, AppState};
use bookshelf_kernel::settings::Settings;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "s3cret-pass";
const BOUNDARY: &str = "bookshelf-test-boundary";

/// A bootstrapped application on a private database and media root.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub async fn spawn() -> TestApp {
    spawn_with(|_| {}).await
}

pub async fn spawn_with(configure: impl FnOnce(&mut Settings)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.database.url = format!("sqlite://{}", dir.path().join("test.db").display());
    settings.media.root = dir.path().join("media");
    configure(&mut settings);

    let app = bookshelf_app::bootstrap(settings).await.unwrap();
    TestApp {
        router: app.router(),
        state: app.state,
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Response<Body> {
        let body = fields
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        body: MultipartBody,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, MultipartBody::content_type());
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.finish())).unwrap()).await
    }

    /// Register through the HTTP form and return the session cookie pair.
    pub async fn register(&self, username: &str) -> String {
        let response = self
            .post_form(
                "/register/",
                &[
                    ("username", username),
                    ("email", ""),
                    ("password1", PASSWORD),
                    ("password2", PASSWORD),
                ],
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("registration sets a session cookie")
    }

    /// Create a superuser directly and sign in through the login form.
    pub async fn superuser(&self, username: &str) -> String {
        create_account(&self.state, username, "", PASSWORD, true)
            .await
            .unwrap();
        self.login(username, PASSWORD).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_form(
                "/accounts/login/",
                &[("username", username), ("password", password)],
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login sets a session cookie")
    }

    /// Create a book through the given create path, returning the response.
    pub async fn create_book(
        &self,
        path: &str,
        title: &str,
        source_type: Option<&str>,
        cookie: &str,
    ) -> Response<Body> {
        let mut body = MultipartBody::new()
            .text("title", title)
            .text("author", "Herbert")
            .file("image", "cover.png", "image/png", &png());
        if let Some(source_type) = source_type {
            body = body.text("source_type", source_type);
        }
        self.post_multipart(path, body, Some(cookie)).await
    }

    pub async fn book_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM book")
            .fetch_one(&self.state.pool)
            .await
            .unwrap()
    }

    pub async fn user_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM auth_user")
            .fetch_one(&self.state.pool)
            .await
            .unwrap()
    }

    /// `(id, title, author, image, source_type)` rows in id order.
    pub async fn books(&self) -> Vec<(i64, String, String, String, i64)> {
        sqlx::query_as("SELECT id, title, author, image, source_type FROM book ORDER BY id")
            .fetch_all(&self.state.pool)
            .await
            .unwrap()
    }
}

/// `name=value` of the session cookie set by `response`.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("bookshelf_session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value: &HeaderValue| value.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A small valid PNG.
pub fn png() -> Vec<u8> {
    let mut out = Vec::new();
    image::RgbImage::from_pixel(4, 4, image::Rgb([20, 120, 220]))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}
