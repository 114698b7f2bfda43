use crate::driver::{DriverFactory, InteractivePage, NavigateOptions, PageDriver};
use crate::error::{Result, ScanError};
use crate::result::{ConsoleMessage, ElementHandle, ElementInfo, NetworkResponse, PageResponse};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, RequestBuilder};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = "Sitegate/0.1 (https://github.com/trapdoorsec/sitegate)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page driver backed by plain HTTP requests and static HTML parsing.
///
/// Every driver owns its own client and therefore its own cookie jar, which is
/// what makes one driver per validation worker an isolated browsing context.
/// Scripts are never executed, so no console messages are ever produced.
pub struct HttpDriver {
    client: Client,
    session_cookie: Option<String>,
    subresources: bool,
    current_url: String,
    document: Option<String>,
    history: Vec<String>,
    console: Vec<ConsoleMessage>,
    network: Vec<NetworkResponse>,
}

impl HttpDriver {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            session_cookie: None,
            subresources: false,
            current_url: String::new(),
            document: None,
            history: Vec::new(),
            console: Vec::new(),
            network: Vec::new(),
        })
    }

    /// Send `cookie` as the `Cookie` header on every request
    pub fn with_session_cookie(mut self, cookie: String) -> Self {
        self.session_cookie = Some(cookie);
        self
    }

    /// Also fetch same-origin scripts, stylesheets and images after each
    /// navigation so their statuses show up as network responses.
    pub fn with_subresources(mut self, enabled: bool) -> Self {
        self.subresources = enabled;
        self
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match self.session_cookie {
            Some(ref cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        }
    }

    /// Load `url` without touching the history stack
    async fn load(&mut self, url: &str, options: NavigateOptions) -> Result<PageResponse> {
        self.console.clear();
        self.network.clear();

        let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        let timeout_ms = options.timeout.as_millis() as u64;

        debug!("Navigating to {} ({:?})", parsed, options.wait_until);

        let response = self
            .request(parsed.as_str())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| timeout_or(e, timeout_ms))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| timeout_or(e, timeout_ms))?;

        self.network.push(NetworkResponse {
            url: final_url.clone(),
            status,
            method: "GET".to_string(),
        });
        self.current_url = final_url.clone();
        self.document = Some(body);

        if self.subresources {
            self.fetch_subresources(options.timeout).await;
        }

        Ok(PageResponse {
            url: final_url,
            status,
        })
    }

    async fn fetch_subresources(&mut self, timeout: Duration) {
        let urls = match self.document {
            Some(ref doc) => subresource_urls(doc, &self.current_url),
            None => return,
        };

        let requests: Vec<_> = urls
            .into_iter()
            .map(|url| {
                let request = self.request(&url).timeout(timeout);
                async move { (url, request.send().await) }
            })
            .collect();

        for (url, outcome) in join_all(requests).await {
            match outcome {
                Ok(response) => self.network.push(NetworkResponse {
                    url,
                    status: response.status().as_u16(),
                    method: "GET".to_string(),
                }),
                Err(e) => debug!("Subresource {} failed: {}", url, e),
            }
        }
    }

    fn parsed_document(&self) -> Result<Html> {
        let doc = self.document.as_ref().ok_or(ScanError::NoDocument)?;
        Ok(Html::parse_document(doc))
    }

    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<T> {
        let document = self.parsed_document()?;
        let selector = parse_selector(&handle.selector)?;
        let element = document.select(&selector).nth(handle.index).ok_or_else(|| {
            ScanError::ElementNotFound(format!("{} [{}]", handle.selector, handle.index))
        })?;
        Ok(f(element))
    }
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<PageResponse> {
        self.load(url, options).await
    }

    fn current_url(&self) -> String {
        self.current_url.clone()
    }

    async fn extract_anchor_hrefs(&mut self) -> Result<Vec<String>> {
        let document = self.parsed_document()?;
        let selector = parse_selector("a[href]")?;

        let links = document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_url(&self.current_url, href))
            .collect();

        Ok(links)
    }

    async fn body_text(&mut self) -> Result<String> {
        let document = self.parsed_document()?;
        let selector = parse_selector("body")?;

        Ok(document
            .select(&selector)
            .next()
            .map(|body| body.text().collect::<String>())
            .unwrap_or_default())
    }

    async fn content(&mut self) -> Result<String> {
        self.document.clone().ok_or(ScanError::NoDocument)
    }

    fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.console)
    }

    fn take_network_responses(&mut self) -> Vec<NetworkResponse> {
        std::mem::take(&mut self.network)
    }
}

#[async_trait]
impl InteractivePage for HttpDriver {
    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let count = self.count(selector).await?;
        Ok((0..count).map(|i| ElementHandle::new(selector, i)).collect())
    }

    async fn element_info(&mut self, element: &ElementHandle) -> Result<ElementInfo> {
        self.with_element(element, |el| ElementInfo {
            text: el.text().collect::<String>().trim().to_string(),
            href: el.value().attr("href").map(str::to_string),
            visible: is_visible(&el),
            enabled: el.value().attr("disabled").is_none(),
        })
    }

    async fn click(&mut self, element: &ElementHandle, force: bool) -> Result<()> {
        let (target, visible) = self.with_element(element, |el| {
            let target = match el.value().name() {
                "a" => el.value().attr("href").map(str::to_string),
                _ => None,
            };
            (target, is_visible(&el))
        })?;

        if !visible && !force {
            return Err(ScanError::Other(format!(
                "element {} [{}] is not visible",
                element.selector, element.index
            )));
        }

        // Only anchors do anything without a script engine
        if let Some(href) = target.and_then(|href| resolve_url(&self.current_url, &href)) {
            let from = self.current_url.clone();
            self.load(&href, NavigateOptions::default()).await?;
            self.history.push(from);
        }
        Ok(())
    }

    async fn count(&mut self, selector: &str) -> Result<usize> {
        let document = self.parsed_document()?;
        let selector = parse_selector(selector)?;
        Ok(document.select(&selector).count())
    }

    async fn go_back(&mut self, timeout: Duration) -> Result<()> {
        let previous = self
            .history
            .pop()
            .ok_or_else(|| ScanError::Other("no previous page in history".to_string()))?;
        self.load(&previous, NavigateOptions::new(Default::default(), timeout))
            .await?;
        Ok(())
    }

    async fn settle(&mut self, _duration: Duration) {
        // Static documents never change after load
    }
}

/// Creates one [`HttpDriver`] per browsing context
#[derive(Debug, Clone)]
pub struct HttpDriverFactory {
    timeout_secs: u64,
    session_cookie: Option<String>,
    subresources: bool,
}

impl HttpDriverFactory {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            session_cookie: None,
            subresources: false,
        }
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    pub fn with_subresources(mut self, enabled: bool) -> Self {
        self.subresources = enabled;
        self
    }

    pub fn build(&self) -> Result<HttpDriver> {
        let mut driver = HttpDriver::with_timeout(self.timeout_secs)?.with_subresources(self.subresources);
        if let Some(ref cookie) = self.session_cookie {
            driver = driver.with_session_cookie(cookie.clone());
        }
        Ok(driver)
    }
}

impl Default for HttpDriverFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

#[async_trait]
impl DriverFactory for HttpDriverFactory {
    async fn new_context(&self) -> Result<Box<dyn PageDriver>> {
        Ok(Box::new(self.build()?))
    }
}

fn timeout_or(error: reqwest::Error, timeout_ms: u64) -> ScanError {
    if error.is_timeout() {
        ScanError::Timeout(timeout_ms)
    } else {
        ScanError::HttpError(error)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScanError::ParseError(format!("invalid selector {:?}: {:?}", selector, e)))
}

fn is_visible(element: &ElementRef<'_>) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            let value = el.value();
            if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
                return false;
            }
            let style: String = value
                .attr("style")
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            !style.contains("display:none") && !style.contains("visibility:hidden")
        })
}

fn subresource_urls(html: &str, page_url: &str) -> Vec<String> {
    let Ok(page) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for (css, attr) in [
        ("script[src]", "src"),
        ("link[rel=stylesheet][href]", "href"),
        ("img[src]", "src"),
    ] {
        let Ok(selector) = Selector::parse(css) else {
            warn!("Skipping unparsable subresource selector {}", css);
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr)
                && let Some(resolved) = resolve_url(page_url, value)
                && let Ok(parsed) = Url::parse(&resolved)
                && parsed.origin() == page.origin()
                && seen.insert(resolved.clone())
            {
                urls.push(resolved);
            }
        }
    }

    urls
}

/// Resolve `href` against `base` the way a browser fills in `a.href`.
/// Non-navigational schemes and bare fragments resolve to nothing.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;
    Some(resolved.to_string())
}
