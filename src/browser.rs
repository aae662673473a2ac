use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, ScrapeError};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) boliganalyse/0.1";

/// One response observed while a page loaded. Captures are append-only for
/// the page's lifetime and read only after the settle delay.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// One browsing context. Request-scoped; closed unconditionally by the owner.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate, recording the response in the capture list.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;
    /// Current rendered markup.
    async fn html(&self) -> Result<String>;
    /// Snapshot of passively captured responses so far.
    async fn captured_responses(&self) -> Vec<CapturedResponse>;
    /// Release the context. Idempotent.
    async fn close(&self);
}

/// The injected browsing-automation capability.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>>;
}

/// Plain-HTTP browser: one GET per navigation, the response captured as the
/// page's single passive observation. Covers server-rendered listings;
/// JS-driven sites plug in a richer `Browser` implementation.
pub struct HttpBrowser {
    client: reqwest::Client,
}

impl HttpBrowser {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            state: Mutex::new(PageState::default()),
        }))
    }
}

#[derive(Default)]
struct PageState {
    html: String,
    captures: Vec<CapturedResponse>,
}

struct HttpPage {
    client: reqwest::Client,
    state: Mutex<PageState>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| ScrapeError::NavigationTimeout(timeout))?
            .map_err(|e| classify_send_error(url, e, timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(ScrapeError::NotFound(url.to_string()));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = tokio::time::timeout(timeout, response.bytes())
            .await
            .map_err(|_| ScrapeError::NavigationTimeout(timeout))??
            .to_vec();

        let mut state = self.state.lock().expect("page state poisoned");
        let is_html = content_type
            .as_deref()
            .map_or(true, |ct| ct.contains("html"));
        if is_html {
            state.html = String::from_utf8_lossy(&body).into_owned();
        }
        state.captures.push(CapturedResponse {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        });
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.state.lock().expect("page state poisoned").html.clone())
    }

    async fn captured_responses(&self) -> Vec<CapturedResponse> {
        self.state.lock().expect("page state poisoned").captures.clone()
    }

    async fn close(&self) {}
}

fn classify_send_error(url: &str, e: reqwest::Error, timeout: Duration) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::NavigationTimeout(timeout)
    } else if e.is_connect() {
        ScrapeError::NotFound(url.to_string())
    } else {
        ScrapeError::Http(e)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// What a canned page serves for one URL.
    #[derive(Default, Clone)]
    pub struct MockPageSpec {
        pub html: String,
        pub captures: Vec<CapturedResponse>,
    }

    /// In-memory browser for pipeline tests: URL → canned page. Counts page
    /// opens and closes so tests can assert unconditional cleanup.
    #[derive(Default)]
    pub struct MockBrowser {
        pub specs: HashMap<String, MockPageSpec>,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl MockBrowser {
        pub fn with_page(mut self, url: &str, spec: MockPageSpec) -> Self {
            self.specs.insert(url.to_string(), spec);
            self
        }

        pub fn open_count(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Browser for MockBrowser {
        async fn new_page(&self) -> Result<Box<dyn Page>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockPage {
                specs: self.specs.clone(),
                current: Mutex::new(None),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    pub struct MockPage {
        specs: HashMap<String, MockPageSpec>,
        current: Mutex<Option<MockPageSpec>>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Page for MockPage {
        async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
            match self.specs.get(url) {
                Some(spec) => {
                    *self.current.lock().unwrap() = Some(spec.clone());
                    Ok(())
                }
                None => Err(ScrapeError::NotFound(url.to_string())),
            }
        }

        async fn html(&self) -> Result<String> {
            Ok(self
                .current
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.html.clone())
                .unwrap_or_default())
        }

        async fn captured_responses(&self) -> Vec<CapturedResponse> {
            self.current
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.captures.clone())
                .unwrap_or_default()
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn pdf_capture(url: &str, body: &[u8]) -> CapturedResponse {
        CapturedResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("application/pdf".to_string()),
            body: body.to_vec(),
        }
    }

    pub fn json_capture(url: &str, value: &serde_json::Value) -> CapturedResponse {
        CapturedResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(value).unwrap(),
        }
    }
}
