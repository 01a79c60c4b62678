use crate::config::Settings;
use crate::update::ReleaseSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
/// Backoff doubles per attempt up to `2^MAX_BACKOFF_SHIFT` seconds.
const MAX_BACKOFF_SHIFT: u32 = 5;
const CLIENT_USER_AGENT: &str = concat!("lifetools/", env!("CARGO_PKG_VERSION"));

/// Non-2xx answer from the GitHub API.
#[derive(Debug, thiserror::Error)]
#[error("GitHub HTTP {status}: {body}")]
pub struct GithubHttpError {
    pub status: StatusCode,
    pub body: String,
}

impl GithubHttpError {
    /// Client errors other than rate limiting will not change on retry.
    pub fn is_retryable(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || !self.status.is_client_error()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl GithubRelease {
    /// The installable package: first `.apk` asset, else the first asset.
    pub fn package_asset(&self) -> Option<&GithubAsset> {
        self.assets
            .iter()
            .find(|a| a.name.to_ascii_lowercase().ends_with(".apk"))
            .or_else(|| self.assets.first())
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    retries: u32,
}

impl ReleaseClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = std::env::var("GITHUB_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let timeout_secs = std::env::var("GITHUB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("GITHUB_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build GitHub http client")?;

        Ok(Self {
            http,
            base_url,
            owner: settings.github_owner.clone(),
            repo: settings.github_repo.clone(),
            retries,
        })
    }

    fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        // GitHub rejects requests without a User-Agent.
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers
    }

    async fn fetch_once(&self) -> Result<GithubRelease> {
        let res = self
            .http
            .get(self.latest_release_url())
            .headers(Self::headers())
            .send()
            .await
            .context("GitHub release request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read GitHub response")?;
        if !status.is_success() {
            return Err(GithubHttpError { status, body: text }.into());
        }

        serde_json::from_str::<GithubRelease>(&text)
            .with_context(|| format!("GitHub response is not a release: {text}"))
    }

    /// Streams `url` into `dest`, reporting `(downloaded, total)` after every chunk.
    /// The file is written to `<dest>.part` and renamed once complete; a failed download leaves
    /// neither file behind.
    pub async fn download_asset<F>(&self, url: &str, dest: &Path, mut on_progress: F) -> Result<u64>
    where
        F: FnMut(u64, Option<u64>),
    {
        let mut res = self
            .http
            .get(url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .with_context(|| format!("download request failed: {url}"))?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "download HTTP {status}: {url}");

        let partial = partial_path(dest);
        let written = match stream_to_file(&mut res, &partial, &mut on_progress).await {
            Ok(n) => n,
            Err(err) => {
                discard_partial(&partial).await;
                return Err(err);
            }
        };

        if let Err(err) = tokio::fs::rename(&partial, dest).await {
            discard_partial(&partial).await;
            return Err(err).with_context(|| format!("failed to move download to {}", dest.display()));
        }

        tracing::info!(%url, dest = %dest.display(), bytes = written, "download finished");
        Ok(written)
    }
}

/// `<dest>.part`, keeping the original extension.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file<F>(res: &mut reqwest::Response, path: &Path, on_progress: &mut F) -> Result<u64>
where
    F: FnMut(u64, Option<u64>),
{
    let total = res.content_length();
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut downloaded: u64 = 0;
    while let Some(chunk) = res.chunk().await.context("download interrupted")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }
    file.flush()
        .await
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(downloaded)
}

async fn discard_partial(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove partial download");
        }
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT))
}

#[async_trait::async_trait]
impl ReleaseSource for ReleaseClient {
    async fn latest_release(&self) -> Result<GithubRelease> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(release) => return Ok(release),
                Err(err) => {
                    let retryable = err
                        .downcast_ref::<GithubHttpError>()
                        .map_or(true, GithubHttpError::is_retryable);
                    if !retryable || attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "GitHub release fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every connection with the same raw HTTP response and counts connections.
    async fn serve(response: String) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn client(base_url: &str, retries: u32) -> ReleaseClient {
        ReleaseClient {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            owner: "octo".to_string(),
            repo: "tools".to_string(),
            retries,
        }
    }

    fn temp_dest(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lifetools-{}-{name}.apk", std::process::id()))
    }

    #[test]
    fn partial_file_keeps_the_extension() {
        assert_eq!(
            partial_path(Path::new("downloads/lifetools.apk")),
            PathBuf::from("downloads/lifetools.apk.part")
        );
        assert_eq!(partial_path(Path::new("bundle")), PathBuf::from("bundle.part"));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
        assert_eq!(retry_backoff(6), Duration::from_secs(32));
        assert_eq!(retry_backoff(7), Duration::from_secs(32));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(32));
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        let err = |status| GithubHttpError {
            status,
            body: String::new(),
        };
        assert!(!err(StatusCode::NOT_FOUND).is_retryable());
        assert!(!err(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(err(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(err(StatusCode::BAD_GATEWAY).is_retryable());
    }

    #[tokio::test]
    async fn missing_release_fails_without_retrying() {
        let (base, hits) = serve(http_response("404 Not Found", r#"{"message":"Not Found"}"#)).await;
        let err = client(&base, 3).latest_release().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<GithubHttpError>().map(|e| e.status),
            Some(StatusCode::NOT_FOUND)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let (base, hits) = serve(http_response("503 Service Unavailable", "{}")).await;
        assert!(client(&base, 2).latest_release().await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetches_latest_release() {
        let body = r#"{"tag_name":"v1.2.0","assets":[{"name":"app.apk","browser_download_url":"https://example.com/app.apk"}]}"#;
        let (base, _) = serve(http_response("200 OK", body)).await;
        let release = client(&base, 1).latest_release().await.unwrap();
        assert_eq!(release.tag_name, "v1.2.0");
        assert_eq!(release.package_asset().unwrap().name, "app.apk");
    }

    #[tokio::test]
    async fn download_renames_completed_file() {
        let (base, _) = serve(http_response("200 OK", "hello world")).await;
        let dest = temp_dest("complete");
        let mut progress = Vec::new();
        let bytes = client(&base, 1)
            .download_asset(&format!("{base}/app.apk"), &dest, |done, total| {
                progress.push((done, total))
            })
            .await
            .unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(progress.last(), Some(&(11, Some(11))));
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
        assert!(!partial_path(&dest).exists());
        tokio::fs::remove_file(&dest).await.unwrap();
    }

    #[tokio::test]
    async fn interrupted_download_leaves_no_files() {
        let truncated =
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello".to_string();
        let (base, _) = serve(truncated).await;
        let dest = temp_dest("truncated");
        let result = client(&base, 1)
            .download_asset(&format!("{base}/app.apk"), &dest, |_, _| {})
            .await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn parses_release_payload_and_ignores_extra_keys() {
        let v = json!({
            "tag_name": "v0.2.0",
            "name": "Spring release",
            "draft": false,
            "assets": [
                {"name": "notes.txt", "browser_download_url": "https://example.com/notes.txt", "size": 10},
                {"name": "app-release.APK", "browser_download_url": "https://example.com/app.apk"}
            ]
        });
        let release: GithubRelease = serde_json::from_value(v).unwrap();
        assert_eq!(release.tag_name, "v0.2.0");
        assert_eq!(
            release.package_asset().map(|a| a.browser_download_url.as_str()),
            Some("https://example.com/app.apk")
        );
    }

    #[test]
    fn falls_back_to_first_asset_or_none() {
        let release: GithubRelease = serde_json::from_value(json!({
            "tag_name": "v1",
            "assets": [{"name": "bundle.zip", "browser_download_url": "https://example.com/b.zip"}]
        }))
        .unwrap();
        assert_eq!(release.package_asset().unwrap().name, "bundle.zip");

        let bare: GithubRelease = serde_json::from_value(json!({"tag_name": "v1"})).unwrap();
        assert!(bare.package_asset().is_none());
    }

    #[test]
    fn builds_latest_release_url() {
        let client = ReleaseClient {
            http: reqwest::Client::new(),
            base_url: "https://ghe.example.com/api/".to_string(),
            owner: "octo".to_string(),
            repo: "tools".to_string(),
            retries: 1,
        };
        assert_eq!(
            client.latest_release_url(),
            "https://ghe.example.com/api/repos/octo/tools/releases/latest"
        );
    }
}
