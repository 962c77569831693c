use std::time::Duration;

use url::Url;

use crate::error::ScraperError;

pub const DEFAULT_BASE_URL: &str = "https://www.yupparaj.ac.th";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: Url,
    pub user_agent: String,
    /// トランスポート側のリクエストタイムアウト
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ScraperError> {
        self.base_url = Url::parse(base_url)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST時の Origin ヘッダ値
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }
}
