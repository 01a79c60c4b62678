pub mod github;
pub mod version;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

pub use github::{GithubAsset, GithubRelease, ReleaseClient};
pub use version::{is_newer, Version};

/// Where the latest published release comes from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self) -> anyhow::Result<GithubRelease>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateStatus {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
    /// Set only when an update is available and the release carries an asset.
    pub download_url: Option<String>,
}

pub async fn check_for_update(
    source: &dyn ReleaseSource,
    current_version: &str,
) -> anyhow::Result<UpdateStatus> {
    let release = source
        .latest_release()
        .await
        .context("failed to fetch latest release")?;

    let update_available = is_newer(&release.tag_name, current_version)
        .with_context(|| format!("cannot compare {} with {current_version}", release.tag_name))?;

    let download_url = if update_available {
        release
            .package_asset()
            .map(|asset| asset.browser_download_url.clone())
    } else {
        None
    };

    tracing::info!(
        current = current_version,
        latest = %release.tag_name,
        update_available,
        "checked for update"
    );

    Ok(UpdateStatus {
        current_version: current_version.to_string(),
        latest_version: release.tag_name,
        update_available,
        download_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRelease(Option<GithubRelease>);

    #[async_trait]
    impl ReleaseSource for FixedRelease {
        async fn latest_release(&self) -> anyhow::Result<GithubRelease> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("GitHub HTTP 404 Not Found"))
        }
    }

    fn release(tag: &str) -> FixedRelease {
        FixedRelease(Some(GithubRelease {
            tag_name: tag.to_string(),
            assets: vec![GithubAsset {
                name: "app-release.apk".to_string(),
                browser_download_url: format!("https://example.com/{tag}/app.apk"),
            }],
        }))
    }

    #[tokio::test]
    async fn newer_tag_offers_download() {
        let status = check_for_update(&release("v0.10.0"), "v0.9.0").await.unwrap();
        assert!(status.update_available);
        assert_eq!(status.latest_version, "v0.10.0");
        assert_eq!(
            status.download_url.as_deref(),
            Some("https://example.com/v0.10.0/app.apk")
        );
    }

    #[tokio::test]
    async fn same_or_older_tag_is_up_to_date() {
        let status = check_for_update(&release("v0.1.0"), "0.1.0").await.unwrap();
        assert!(!status.update_available);
        assert_eq!(status.download_url, None);

        let status = check_for_update(&release("v0.1.0-beta.2"), "v0.1.0").await.unwrap();
        assert!(!status.update_available);
    }

    #[tokio::test]
    async fn release_without_assets_has_no_url() {
        let source = FixedRelease(Some(GithubRelease {
            tag_name: "v2.0.0".to_string(),
            assets: Vec::new(),
        }));
        let status = check_for_update(&source, "v1.0.0").await.unwrap();
        assert!(status.update_available);
        assert!(status.download_url.is_none());
    }

    #[tokio::test]
    async fn fetch_and_parse_failures_propagate() {
        assert!(check_for_update(&FixedRelease(None), "v1.0.0").await.is_err());
        assert!(check_for_update(&release("nightly"), "v1.0.0").await.is_err());
    }
}
