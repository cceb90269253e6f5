//! Operator alerts via the KakaoTalk "send to me" memo API.
//!
//! Alerts are best effort: a failed send is logged and swallowed. Repeats
//! within the cooldown window are suppressed by [`AlertCooldown`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MEMO_ENDPOINT: &str = "https://kapi.kakao.com/v2/api/talk/memo/default/send";
const LINK_URL: &str = "https://news.naver.com";
const BUTTON_TITLE: &str = "확인하기";
/// Kakao rejects memo text beyond this length.
const MAX_TEXT_CHARS: usize = 200;

#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, subject: &str, body: &str);
}

/// Suppresses repeated alerts inside a fixed window.
#[derive(Debug)]
pub struct AlertCooldown {
    window: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl AlertCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: Mutex::new(None),
        }
    }

    /// Claim the slot at `now`; false while the previous claim is still
    /// inside the window.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = match self.last_sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(prev) = *last {
            if now.saturating_duration_since(prev) < self.window {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}

/// Build the memo text, capped at the API limit.
pub fn memo_text(subject: &str, body: &str) -> String {
    let text = format!("[news_podcast] {subject}\n{body}");
    crate::utils::prefix_chars(&text, MAX_TEXT_CHARS).to_string()
}

pub struct KakaoAlerter {
    client: Client,
    access_token: String,
    cooldown: AlertCooldown,
}

impl fmt::Debug for KakaoAlerter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KakaoAlerter")
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl KakaoAlerter {
    pub fn new(access_token: String, cooldown: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            access_token,
            cooldown: AlertCooldown::new(cooldown),
        })
    }
}

#[async_trait]
impl Alerter for KakaoAlerter {
    async fn alert(&self, subject: &str, body: &str) {
        if !self.cooldown.try_acquire() {
            debug!(%subject, "Alert suppressed by cooldown");
            return;
        }
        let template = json!({
            "object_type": "text",
            "text": memo_text(subject, body),
            "link": { "web_url": LINK_URL, "mobile_web_url": LINK_URL },
            "button_title": BUTTON_TITLE,
        });
        let result = self
            .client
            .post(MEMO_ENDPOINT)
            .bearer_auth(&self.access_token)
            .form(&[("template_object", template.to_string())])
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => info!(%subject, "Operator alert sent"),
            Ok(resp) => warn!(status = resp.status().as_u16(), "Operator alert rejected"),
            Err(e) => warn!(error = %e, "Operator alert failed"),
        }
    }
}

/// Used when no alert credentials are configured.
#[derive(Debug, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn alert(&self, subject: &str, body: &str) {
        warn!(%subject, %body, "Operator alert (no alert channel configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_suppresses_within_window() {
        let cooldown = AlertCooldown::new(Duration::from_secs(600));
        let t0 = Instant::now();
        assert!(cooldown.try_acquire_at(t0));
        assert!(!cooldown.try_acquire_at(t0 + Duration::from_secs(599)));
        assert!(cooldown.try_acquire_at(t0 + Duration::from_secs(600)));
        assert!(!cooldown.try_acquire_at(t0 + Duration::from_secs(601)));
    }

    #[test]
    fn test_zero_window_never_suppresses() {
        let cooldown = AlertCooldown::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(cooldown.try_acquire_at(t0));
        assert!(cooldown.try_acquire_at(t0));
    }

    #[test]
    fn test_memo_text_is_capped() {
        let text = memo_text("배치 실패", &"가".repeat(500));
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
        assert!(text.starts_with("[news_podcast] 배치 실패\n"));
    }

    #[test]
    fn test_debug_hides_token() {
        let alerter = KakaoAlerter::new("secret-token".into(), Duration::from_secs(1)).unwrap();
        assert!(!format!("{alerter:?}").contains("secret-token"));
    }
}
