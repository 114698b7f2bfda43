//! Safe clicking on an already-loaded page.
//!
//! Every element is checked against the safety rules before it is touched,
//! and each click is classified by the first visible effect it produced.

use crate::safety::is_dangerous_button;
use serde::{Deserialize, Serialize};
use sitegate_scanner::{ElementHandle, InteractivePage, NavigateOptions, WaitUntil};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const BUTTON_SELECTORS: &[&str] = &[
    "button",
    "a[role=\"button\"]",
    "[role=\"button\"]",
    "a.btn",
    "a.button",
];

pub const MODAL_SELECTOR: &str =
    "[role=\"dialog\"], .modal, [class*=\"modal\"], [class*=\"Modal\"]";

pub const TOAST_SELECTOR: &str = "[role=\"alert\"], .toast, .snackbar, [class*=\"toast\"], [class*=\"Toast\"], [class*=\"notification\"]";

pub const CLOSE_SELECTOR: &str = "[aria-label=\"Close\"], .close, [class*=\"close\"]";

pub const NAVIGATION_LINK_SELECTOR: &str = "nav a, [role=\"navigation\"] a";

/// Visible elements exercised per button selector
pub const MAX_BUTTONS_PER_SELECTOR: usize = 3;

const EFFECT_SETTLE: Duration = Duration::from_millis(500);
const GO_BACK_TIMEOUT: Duration = Duration::from_secs(5);
const RENAVIGATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Clicked,
    Skipped,
    Validated,
    Failed,
}

/// What an interaction attempt observed, or why it never clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionOutcome {
    #[serde(rename = "URL changed")]
    UrlChanged,
    #[serde(rename = "Modal opened")]
    ModalOpened,
    #[serde(rename = "Toast appeared")]
    ToastAppeared,
    #[serde(rename = "No visible effect")]
    NoVisibleEffect,
    #[serde(rename = "dangerous")]
    Dangerous,
    #[serde(rename = "not clickable")]
    NotClickable,
    #[serde(rename = "link exists")]
    LinkExists,
    #[serde(rename = "dangerous or no href")]
    DangerousOrNoHref,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for InteractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionOutcome::UrlChanged => "URL changed",
            InteractionOutcome::ModalOpened => "Modal opened",
            InteractionOutcome::ToastAppeared => "Toast appeared",
            InteractionOutcome::NoVisibleEffect => "No visible effect",
            InteractionOutcome::Dangerous => "dangerous",
            InteractionOutcome::NotClickable => "not clickable",
            InteractionOutcome::LinkExists => "link exists",
            InteractionOutcome::DangerousOrNoHref => "dangerous or no href",
            InteractionOutcome::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResult {
    pub success: bool,
    pub action: InteractionAction,
    #[serde(rename = "validation")]
    pub outcome: InteractionOutcome,
    /// Visible text of the element, when it could be read
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl InteractionResult {
    fn clicked(label: String, outcome: InteractionOutcome) -> Self {
        Self {
            success: true,
            action: InteractionAction::Clicked,
            outcome,
            label,
            error: None,
        }
    }

    fn skipped(label: String, outcome: InteractionOutcome, error: Option<String>) -> Self {
        Self {
            success: false,
            action: InteractionAction::Skipped,
            outcome,
            label,
            error,
        }
    }

    fn failed(label: String, error: String) -> Self {
        Self {
            success: false,
            action: InteractionAction::Failed,
            outcome: InteractionOutcome::Error,
            label,
            error: Some(error),
        }
    }
}

/// Click `element` unless the safety rules or its state forbid it, then
/// report the first effect observed.
pub async fn click_safely<P: InteractivePage + ?Sized>(
    page: &mut P,
    element: &ElementHandle,
) -> InteractionResult {
    let info = match page.element_info(element).await {
        Ok(info) => info,
        Err(e) => {
            return InteractionResult::failed(
                String::new(),
                format!("Button \"unknown\" failed: {}", e),
            );
        }
    };

    if is_dangerous_button(&info.text, info.href.as_deref()) {
        debug!("Skipping dangerous element {:?}", info.text);
        return InteractionResult::skipped(
            info.text.clone(),
            InteractionOutcome::Dangerous,
            Some(format!("Button appears dangerous: \"{}\"", info.text)),
        );
    }

    if !info.visible || !info.enabled {
        return InteractionResult::skipped(
            info.text,
            InteractionOutcome::NotClickable,
            Some("Button not visible or enabled".to_string()),
        );
    }

    let original_url = page.current_url();
    let modals_before = page.count(MODAL_SELECTOR).await.unwrap_or(0);
    let toasts_before = page.count(TOAST_SELECTOR).await.unwrap_or(0);

    if let Err(e) = page.click(element, false).await {
        warn!("Standard click failed for {:?} ({}), trying force click", info.text, e);
        if let Err(e) = page.click(element, true).await {
            let error = format!("Button \"{}\" failed: {}", info.text, e);
            return InteractionResult::failed(info.text, error);
        }
    }

    page.settle(EFFECT_SETTLE).await;

    let outcome = if page.current_url() != original_url {
        InteractionOutcome::UrlChanged
    } else if page.count(MODAL_SELECTOR).await.unwrap_or(0) > modals_before {
        InteractionOutcome::ModalOpened
    } else if page.count(TOAST_SELECTOR).await.unwrap_or(0) > toasts_before {
        InteractionOutcome::ToastAppeared
    } else {
        InteractionOutcome::NoVisibleEffect
    };

    InteractionResult::clicked(info.text, outcome)
}

/// Click up to [`MAX_BUTTONS_PER_SELECTOR`] visible elements for every
/// button selector, restoring the page after each effect.
pub async fn exercise_page_buttons<P: InteractivePage + ?Sized>(
    page: &mut P,
) -> Vec<InteractionResult> {
    let mut results = Vec::new();

    for selector in BUTTON_SELECTORS {
        let handles = match page.query_all(selector).await {
            Ok(handles) => handles,
            Err(e) => {
                debug!("Could not query {}: {}", selector, e);
                continue;
            }
        };

        let mut visible = Vec::new();
        for handle in handles {
            if let Ok(info) = page.element_info(&handle).await
                && info.visible
            {
                visible.push(handle);
            }
            if visible.len() >= MAX_BUTTONS_PER_SELECTOR {
                break;
            }
        }

        for handle in visible {
            let current_url = page.current_url();
            let result = click_safely(page, &handle).await;

            match result.outcome {
                InteractionOutcome::UrlChanged => restore_page(page, &current_url).await,
                InteractionOutcome::ModalOpened => dismiss_modal(page).await,
                _ => {}
            }

            results.push(result);
        }
    }

    results
}

/// Check every navigation link without clicking it
pub async fn check_navigation_links<P: InteractivePage + ?Sized>(
    page: &mut P,
) -> Vec<InteractionResult> {
    let handles = match page.query_all(NAVIGATION_LINK_SELECTOR).await {
        Ok(handles) => handles,
        Err(e) => return vec![InteractionResult::failed(String::new(), e.to_string())],
    };

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let info = match page.element_info(&handle).await {
            Ok(info) => info,
            Err(e) => {
                results.push(InteractionResult::failed(String::new(), e.to_string()));
                continue;
            }
        };

        let result = match info.href {
            Some(ref href) if !is_dangerous_button(&info.text, Some(href)) => InteractionResult {
                success: true,
                action: InteractionAction::Validated,
                outcome: InteractionOutcome::LinkExists,
                label: info.text,
                error: None,
            },
            _ => InteractionResult::skipped(info.text, InteractionOutcome::DangerousOrNoHref, None),
        };
        results.push(result);
    }

    results
}

/// Undo a navigation caused by a click: history first, then a direct visit
pub async fn restore_page<P: InteractivePage + ?Sized>(page: &mut P, url: &str) {
    if let Err(e) = page.go_back(GO_BACK_TIMEOUT).await {
        warn!("Could not go back ({}), navigating to {} directly", e, url);
        let options = NavigateOptions::new(WaitUntil::DomContentLoaded, RENAVIGATE_TIMEOUT);
        if let Err(e) = page.navigate(url, options).await {
            debug!("Re-navigation to {} failed: {}", url, e);
        }
    }
}

pub async fn dismiss_modal<P: InteractivePage + ?Sized>(page: &mut P) {
    if page.count(CLOSE_SELECTOR).await.unwrap_or(0) > 0 {
        let close = ElementHandle::new(CLOSE_SELECTOR, 0);
        if let Err(e) = page.click(&close, false).await {
            debug!("Could not dismiss modal: {}", e);
        }
    }
}
