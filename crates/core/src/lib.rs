pub mod language;
pub mod llm;
pub mod recipe;
pub mod recommend;
pub mod spinner;
pub mod tip;
pub mod truth;
pub mod update;

pub mod config {
    use crate::language::AppLanguage;
    use anyhow::Context;

    const DEFAULT_GITHUB_OWNER: &str = "RRechz";
    const DEFAULT_GITHUB_REPO: &str = "LifeTools";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub language: AppLanguage,
        pub github_owner: String,
        pub github_repo: String,
        pub current_version: String,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                gemini_api_key: std::env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                language: AppLanguage::from_code(std::env::var("LIFETOOLS_LANGUAGE").ok().as_deref()),
                github_owner: std::env::var("GITHUB_OWNER")
                    .unwrap_or_else(|_| DEFAULT_GITHUB_OWNER.to_string()),
                github_repo: std::env::var("GITHUB_REPO")
                    .unwrap_or_else(|_| DEFAULT_GITHUB_REPO.to_string()),
                current_version: std::env::var("LIFETOOLS_CURRENT_VERSION")
                    .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }
    }
}
