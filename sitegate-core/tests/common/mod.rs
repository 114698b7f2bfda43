// Scripted in-memory site and page driver shared by the engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use sitegate_core::interaction::{MODAL_SELECTOR, TOAST_SELECTOR};
use sitegate_scanner::error::Result;
use sitegate_scanner::{
    ConsoleMessage, DriverFactory, ElementHandle, ElementInfo, InteractivePage, NavigateOptions,
    NetworkResponse, PageDriver, PageResponse, ScanError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "https://shop.test";

/// Filler long enough to never count as a blank page
pub const CONTENT: &str =
    "Welcome to the shop. Browse our catalogue, compare products and read the reviews.";

#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    Nothing,
    Navigate(String),
    OpenModal,
    ShowToast,
    CloseModal,
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub selectors: Vec<String>,
    pub text: String,
    pub href: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub effect: ClickEffect,
    /// Plain clicks fail as if another element covered this one
    pub obstructed: bool,
}

impl FakeElement {
    pub fn button(text: &str) -> Self {
        Self {
            selectors: vec!["button".to_string()],
            text: text.to_string(),
            href: None,
            visible: true,
            enabled: true,
            effect: ClickEffect::Nothing,
            obstructed: false,
        }
    }

    pub fn link(selector: &str, text: &str, href: &str) -> Self {
        Self {
            selectors: vec![selector.to_string()],
            text: text.to_string(),
            href: Some(href.to_string()),
            visible: true,
            enabled: true,
            effect: ClickEffect::Navigate(href.to_string()),
            obstructed: false,
        }
    }

    pub fn matching(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn with_effect(mut self, effect: ClickEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn obstructed(mut self) -> Self {
        self.obstructed = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub status: u16,
    pub body: String,
    pub links: Vec<String>,
    pub content: String,
    pub redirect_to: Option<String>,
    pub console: Vec<ConsoleMessage>,
    pub network: Vec<NetworkResponse>,
    pub error: Option<String>,
    pub delay: Option<Duration>,
    pub elements: Vec<FakeElement>,
}

impl FakePage {
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: CONTENT.to_string(),
            links: Vec::new(),
            content: String::new(),
            redirect_to: None,
            console: Vec::new(),
            network: Vec::new(),
            error: None,
            delay: None,
            elements: Vec::new(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok()
        }
    }

    pub fn sitemap(locs: &[&str]) -> Self {
        let entries: String = locs
            .iter()
            .map(|loc| format!("<url><loc>{}</loc></url>", loc))
            .collect();
        Self {
            content: format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
                entries
            ),
            ..Self::ok()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn with_links(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn redirecting_to(mut self, url: &str) -> Self {
        self.redirect_to = Some(url.to_string());
        self
    }

    pub fn with_console_error(mut self, text: &str) -> Self {
        self.console.push(ConsoleMessage::error(text));
        self
    }

    pub fn with_network(mut self, url: &str, status: u16) -> Self {
        self.network.push(NetworkResponse {
            url: url.to_string(),
            status,
            method: "GET".to_string(),
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// URL to page table; unknown URLs answer 404 with an empty body
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn lookup(&self, url: &str) -> FakePage {
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakePage::status(404).with_body(""))
    }
}

pub struct FakeDriver {
    site: Arc<FakeSite>,
    current_url: String,
    current: Option<FakePage>,
    history: Vec<String>,
    console: Vec<ConsoleMessage>,
    network: Vec<NetworkResponse>,
    modal_open: bool,
    toast_shown: bool,
    pub visits: Arc<Mutex<Vec<String>>>,
    pub clicks: Arc<Mutex<Vec<String>>>,
}

impl FakeDriver {
    pub fn new(site: FakeSite) -> Self {
        Self::shared(Arc::new(site), Arc::new(Mutex::new(Vec::new())))
    }

    pub fn shared(site: Arc<FakeSite>, visits: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            site,
            current_url: String::new(),
            current: None,
            history: Vec::new(),
            console: Vec::new(),
            network: Vec::new(),
            modal_open: false,
            toast_shown: false,
            visits,
            clicks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Load `url` as if the page were already open, without recording a visit
    pub async fn open(site: FakeSite, url: &str) -> Self {
        let mut driver = Self::new(site);
        driver
            .navigate(url, NavigateOptions::default())
            .await
            .expect("page loads");
        driver.visits.lock().unwrap().clear();
        driver
    }

    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    async fn load(&mut self, url: &str) -> Result<PageResponse> {
        self.visits.lock().unwrap().push(url.to_string());
        self.console.clear();
        self.network.clear();
        self.modal_open = false;
        self.toast_shown = false;

        let page = self.site.lookup(url);
        if let Some(delay) = page.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref message) = page.error {
            return Err(ScanError::Other(message.clone()));
        }

        let final_url = page.redirect_to.clone().unwrap_or_else(|| url.to_string());
        self.console = page.console.clone();
        self.network = page.network.clone();
        self.network.push(NetworkResponse {
            url: final_url.clone(),
            status: page.status,
            method: "GET".to_string(),
        });

        let response = PageResponse {
            url: final_url.clone(),
            status: page.status,
        };
        self.current_url = final_url;
        self.current = Some(page);
        Ok(response)
    }

    fn page(&self) -> Result<&FakePage> {
        self.current.as_ref().ok_or(ScanError::NoDocument)
    }

    fn element(&self, handle: &ElementHandle) -> Result<FakeElement> {
        self.page()?
            .elements
            .iter()
            .filter(|e| e.selectors.contains(&handle.selector))
            .nth(handle.index)
            .cloned()
            .ok_or_else(|| ScanError::ElementNotFound(handle.selector.clone()))
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&mut self, url: &str, _options: NavigateOptions) -> Result<PageResponse> {
        if !self.current_url.is_empty() {
            self.history.push(self.current_url.clone());
        }
        self.load(url).await
    }

    fn current_url(&self) -> String {
        self.current_url.clone()
    }

    async fn extract_anchor_hrefs(&mut self) -> Result<Vec<String>> {
        Ok(self.page()?.links.clone())
    }

    async fn body_text(&mut self) -> Result<String> {
        Ok(self.page()?.body.clone())
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.page()?.content.clone())
    }

    fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        std::mem::take(&mut self.console)
    }

    fn take_network_responses(&mut self) -> Vec<NetworkResponse> {
        std::mem::take(&mut self.network)
    }
}

#[async_trait]
impl InteractivePage for FakeDriver {
    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let count = self.count(selector).await?;
        Ok((0..count).map(|i| ElementHandle::new(selector, i)).collect())
    }

    async fn element_info(&mut self, element: &ElementHandle) -> Result<ElementInfo> {
        let element = self.element(element)?;
        Ok(ElementInfo {
            text: element.text,
            href: element.href,
            visible: element.visible,
            enabled: element.enabled,
        })
    }

    async fn click(&mut self, element: &ElementHandle, force: bool) -> Result<()> {
        let target = self.element(element)?;
        if !force && !target.visible {
            return Err(ScanError::Other("element is not visible".to_string()));
        }
        if !force && target.obstructed {
            return Err(ScanError::Other(
                "element click intercepted by overlay".to_string(),
            ));
        }

        self.clicks.lock().unwrap().push(target.text.clone());
        match target.effect {
            ClickEffect::Nothing => {}
            ClickEffect::Navigate(href) => {
                self.navigate(&href, NavigateOptions::default()).await?;
            }
            ClickEffect::OpenModal => self.modal_open = true,
            ClickEffect::ShowToast => self.toast_shown = true,
            ClickEffect::CloseModal => self.modal_open = false,
        }
        Ok(())
    }

    async fn count(&mut self, selector: &str) -> Result<usize> {
        let mut count = self
            .page()?
            .elements
            .iter()
            .filter(|e| e.selectors.iter().any(|s| s == selector))
            .count();
        if selector == MODAL_SELECTOR && self.modal_open {
            count += 1;
        }
        if selector == TOAST_SELECTOR && self.toast_shown {
            count += 1;
        }
        Ok(count)
    }

    async fn go_back(&mut self, _timeout: Duration) -> Result<()> {
        let previous = self
            .history
            .pop()
            .ok_or_else(|| ScanError::Other("no history".to_string()))?;
        self.load(&previous).await?;
        Ok(())
    }

    async fn settle(&mut self, _duration: Duration) {}
}

/// Hands out drivers over one shared site and one shared visit log
pub struct FakeFactory {
    site: Arc<FakeSite>,
    pub visits: Arc<Mutex<Vec<String>>>,
    broken: bool,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            visits: Arc::new(Mutex::new(Vec::new())),
            broken: false,
        }
    }

    /// A factory whose contexts can never be opened
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new(FakeSite::new())
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn new_context(&self) -> Result<Box<dyn PageDriver>> {
        if self.broken {
            return Err(ScanError::Other("browser is closed".to_string()));
        }
        Ok(Box::new(FakeDriver::shared(
            self.site.clone(),
            self.visits.clone(),
        )))
    }
}
