#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use videotube::auth::BcryptHasher;
use videotube::configuration::{ApplicationSettings, JwtSettings, MediaSettings};
use videotube::error::MediaError;
use videotube::media::{MediaStore, UploadedMedia};
use videotube::startup::{run, AppComponents};
use videotube::store::InMemoryUserStore;
use videotube::uploads::StagingArea;

/// File contents the fake media host refuses
pub const REJECTED_UPLOAD: &[u8] = b"fail";

/// Media host stand-in: reads the staged file and refuses `REJECTED_UPLOAD`
pub struct FakeMediaStore;

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, local_path: &str) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|_| MediaError::FileMissing(local_path.to_string()))?;
        if bytes == REJECTED_UPLOAD {
            return Err(MediaError::UploadFailed("rejected by fake host".to_string()));
        }
        let file_name = Path::new(local_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(UploadedMedia {
            url: format!("http://media.test/{}", file_name),
        })
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryUserStore>,
    pub staging_dir: PathBuf,
    pub client: reqwest::Client,
}

pub fn media_settings(staging_dir: &Path) -> MediaSettings {
    MediaSettings {
        upload_url: "http://media.test/upload".to_string(),
        upload_preset: "tests".to_string(),
        timeout_seconds: 1,
        staging_dir: staging_dir.to_string_lossy().to_string(),
        max_upload_bytes: 64 * 1024,
    }
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_token_secret: "integration-access-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_secret: "integration-refresh-secret".to_string(),
        refresh_token_expiry: 864000,
        issuer: "videotube-tests".to_string(),
        revoke_on_password_change: false,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(jwt_settings()).await
}

pub async fn spawn_app_with(jwt: JwtSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryUserStore::new());
    let staging = StagingArea::new(&media_settings(
        &std::env::temp_dir().join(format!("videotube-staging-{}", Uuid::new_v4())),
    ));
    let staging_dir = staging.dir().to_path_buf();
    let components = AppComponents::new(
        store.clone(),
        Arc::new(BcryptHasher::new(4)),
        Arc::new(FakeMediaStore),
        staging,
        &jwt,
    );
    let application = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        cookie_secure: false,
    };

    let server = run(listener, components, application).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        staging_dir,
        client: reqwest::Client::new(),
    }
}

/// Image part with the given bytes
pub fn image(file_name: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec())
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .expect("valid mime type")
}

/// Multipart registration form with an avatar
pub fn registration_form(username: &str, email: &str, password: &str) -> Form {
    Form::new()
        .text("fullName", "Test User")
        .text("email", email.to_string())
        .text("username", username.to_string())
        .text("password", password.to_string())
        .part("avatar", image("avatar.png", b"avatar-bytes"))
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.register_form(registration_form(username, email, password))
            .await
    }

    pub async fn register_form(&self, form: Form) -> reqwest::Response {
        self.client
            .post(self.url("/users/register"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Files left behind in the staging directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(&self.staging_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/refresh-token"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Registers and logs in, returning `(access_token, refresh_token)`
    pub async fn signed_in(&self, username: &str, email: &str) -> (String, String) {
        assert_eq!(self.register(username, email, "p1").await.status().as_u16(), 201);
        let body: Value = self.login(username, "p1").await.json().await.unwrap();
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

/// Value of a `Set-Cookie` header for `name`, without attributes
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(|v| {
            v[prefix.len()..]
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

/// Full `Set-Cookie` header line for `name`
pub fn set_cookie_line(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(str::to_string)
}
