use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;

use super::ProviderError;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

const MIN_DELAY: Duration = Duration::from_millis(100);

/// Rate-limit shaping applied uniformly to outbound provider traffic:
/// a randomized pause before each attempt and a rotating User-Agent.
#[derive(Debug, Clone)]
pub struct RequestShaper {
    base: Duration,
    jitter: Duration,
}

impl RequestShaper {
    pub fn new(base_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    /// No delay at all. Used when driving ticks from tests.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// `base ± jitter`, floored at 100ms unless shaping is disabled.
    pub fn next_delay(&self) -> Duration {
        if self.base.is_zero() && self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let jitter_ms = self.jitter.as_millis() as i64;
        let offset = if jitter_ms > 0 {
            rand::thread_rng().gen_range(-jitter_ms..=jitter_ms)
        } else {
            0
        };
        let ms = (self.base.as_millis() as i64 + offset).max(0) as u64;
        Duration::from_millis(ms).max(MIN_DELAY)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn user_agent(&self) -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    pub fn browser_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.8,*/*;q=0.7"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers
    }
}

/// Bounded pool for CPU-bound document parsing, kept off the async workers.
#[derive(Debug, Clone)]
pub struct ParsePool {
    permits: Arc<Semaphore>,
}

impl ParsePool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub async fn run<T, F>(&self, job: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ProviderError::WorkerPool(e.to_string()))?;

        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| ProviderError::WorkerPool(e.to_string()))
    }
}

/// Everything a concrete provider needs to talk to the outside world.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub http: Client,
    pub shaper: Arc<RequestShaper>,
    pub parse_pool: ParsePool,
}

impl ProviderContext {
    pub fn new(http: Client, shaper: Arc<RequestShaper>, parse_pool: ParsePool) -> Self {
        Self {
            http,
            shaper,
            parse_pool,
        }
    }

    pub async fn get_text(&self, provider: &'static str, url: &str) -> Result<String, ProviderError> {
        let resp = self
            .http
            .get(url)
            .headers(self.shaper.browser_headers())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider,
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        provider: &'static str,
        url: &str,
    ) -> Result<T, ProviderError> {
        let resp = self
            .http
            .get(url)
            .headers(self.shaper.browser_headers())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider,
                status: resp.status().as_u16(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Parse(format!("{provider}: {e}")))
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        provider: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let resp = self
            .http
            .post(url)
            .headers(self.shaper.browser_headers())
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider,
                status: resp.status().as_u16(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Parse(format!("{provider}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_bounds() {
        let shaper = RequestShaper::new(500, 200);
        for _ in 0..100 {
            let d = shaper.next_delay();
            assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(700));
        }
    }

    #[test]
    fn test_delay_floor() {
        let shaper = RequestShaper::new(50, 0);
        assert_eq!(shaper.next_delay(), MIN_DELAY);
        assert_eq!(RequestShaper::disabled().next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_user_agent_rotates_from_pool() {
        let shaper = RequestShaper::disabled();
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&shaper.user_agent()));
        }
    }

    #[tokio::test]
    async fn test_parse_pool_runs_job() {
        let pool = ParsePool::new(2);
        let n = pool.run(|| (1..=10).sum::<u32>()).await.unwrap();
        assert_eq!(n, 55);
    }
}
