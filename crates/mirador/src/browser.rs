//! Browser control over the Chrome `DevTools` Protocol.
//!
//! [`BrowserConfig`] is always available so callers can build launch
//! settings without the `browser` feature. With the feature, `ChromiumBrowser`
//! launches Chromium and hands out `ChromiumDriver` pages implementing
//! [`PageDriver`](crate::driver::PageDriver).

use serde::{Deserialize, Serialize};

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
mod cdp {
    use super::BrowserConfig;
    use crate::driver::{
        DocumentState, ElementQuery, EventKind, EventStream, PageDriver, PageEvent, RawElement,
        Readiness,
    };
    use crate::locator::Locator;
    use crate::result::{MiradorError, MiradorResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        ConsoleApiCalledType, EnableParams, EventConsoleApiCalled, EventExceptionThrown,
    };
    use chromiumoxide::handler::viewport::Viewport;
    use chromiumoxide::listeners::EventStream as CdpEventStream;
    use chromiumoxide::page::Page as CdpPage;
    use futures::{FutureExt, StreamExt};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot, Mutex};
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    /// Network activity must stay flat this long to count as idle
    const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    const RESOURCE_COUNT_JS: &str = "document.readyState === 'complete' \
        ? performance.getEntriesByType('resource').length : -1";

    const DOCUMENT_JS: &str = r"(() => {
        const stylesheets = Array.from(document.styleSheets).map((sheet) => {
            const href = sheet.href || null;
            try {
                const rules = Array.from(sheet.cssRules || []);
                const font_faces = rules
                    .filter((r) => r.type === 5)
                    .map((r) => r.style.fontFamily || '');
                return { href, rule_count: rules.length, error: null, font_faces };
            } catch (e) {
                return { href, rule_count: null, error: String((e && e.message) || e), font_faces: [] };
            }
        });
        const root = window.getComputedStyle(document.documentElement);
        const root_color_properties = Array.from(root)
            .filter((p) => p.includes('color') || p.startsWith('--')).length;
        return {
            title: document.title,
            url: window.location.href,
            stylesheets,
            fonts: {
                count: document.fonts ? document.fonts.size : 0,
                ready: !!(document.fonts && document.fonts.ready),
            },
            root_color_properties,
        };
    })()";

    fn query_js(query: &ElementQuery) -> MiradorResult<String> {
        let props: Vec<&str> = query.properties.iter().map(|p| p.js_name()).collect();
        let props = serde_json::to_string(&props)?;
        let attrs = serde_json::to_string(&query.attributes)?;
        let elements = query.locator.to_elements_expr();
        Ok(format!(
            r"(() => {{
                const ids = window.__miradorIds || (window.__miradorIds = new WeakMap());
                window.__miradorNext = window.__miradorNext || 1;
                const idOf = (el) => {{
                    let id = ids.get(el);
                    if (id === undefined) {{ id = window.__miradorNext++; ids.set(el, id); }}
                    return id;
                }};
                const props = {props};
                const attrs = {attrs};
                return ({elements}).map((el) => {{
                    const cs = window.getComputedStyle(el);
                    const rect = el.getBoundingClientRect();
                    const styles = {{}};
                    for (const p of props) {{ styles[p] = cs[p] || ''; }}
                    const attributes = {{}};
                    for (const a of attrs) {{
                        if (el.hasAttribute(a)) {{ attributes[a] = el.getAttribute(a); }}
                    }}
                    return {{
                        node_id: idOf(el),
                        tag: el.tagName.toUpperCase(),
                        classes: Array.from(el.classList),
                        text: (el.textContent || '').trim(),
                        child_count: el.children.length,
                        visible: rect.width > 0 && rect.height > 0
                            && cs.visibility !== 'hidden' && cs.display !== 'none',
                        enabled: !el.disabled,
                        styles,
                        attributes,
                    }};
                }});
            }})()"
        ))
    }

    fn click_js(locator: &Locator, index: usize) -> String {
        let elements = locator.to_elements_expr();
        format!(
            r"(() => {{
                const el = ({elements})[{index}];
                if (!el) return 'missing';
                const cs = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 || rect.height === 0 || cs.visibility === 'hidden') return 'hidden';
                if (el.disabled) return 'disabled';
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                el.click();
                return 'clicked';
            }})()"
        )
    }

    fn launch_error(e: impl std::fmt::Display) -> MiradorError {
        MiradorError::BrowserLaunch {
            message: e.to_string(),
        }
    }

    /// Browser instance with real CDP connection
    #[derive(Debug)]
    pub struct ChromiumBrowser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: JoinHandle<()>,
    }

    impl ChromiumBrowser {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> MiradorResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .viewport(Viewport {
                    width: config.viewport_width,
                    height: config.viewport_height,
                    device_scale_factor: None,
                    emulating_mobile: false,
                    is_landscape: false,
                    has_touch: false,
                });

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder.build().map_err(launch_error)?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(launch_error)?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Open a blank page
        ///
        /// # Errors
        ///
        /// Returns error if page cannot be created
        pub async fn new_page(&self) -> MiradorResult<ChromiumDriver> {
            let browser = self.inner.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| MiradorError::Navigation {
                    url: "about:blank".to_string(),
                    message: e.to_string(),
                })?;
            Ok(ChromiumDriver {
                inner: Arc::new(Mutex::new(page)),
                ready: None,
                closed: false,
                listeners: Vec::new(),
                flushers: Vec::new(),
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(self) -> MiradorResult<()> {
            let mut browser = self.inner.lock().await;
            browser.close().await.map_err(launch_error)?;
            self.handle.abort();
            Ok(())
        }
    }

    /// A page driven over CDP
    #[derive(Debug)]
    pub struct ChromiumDriver {
        inner: Arc<Mutex<CdpPage>>,
        ready: Option<Readiness>,
        closed: bool,
        listeners: Vec<JoinHandle<()>>,
        flushers: Vec<mpsc::UnboundedSender<oneshot::Sender<()>>>,
    }

    impl ChromiumDriver {
        async fn eval<T: DeserializeOwned>(&self, expr: String) -> MiradorResult<T> {
            if self.closed {
                return Err(MiradorError::collection("page handle is closed"));
            }
            let page = self.inner.lock().await;
            let result = page
                .evaluate(expr)
                .await
                .map_err(|e| MiradorError::collection(e.to_string()))?;
            result
                .into_value()
                .map_err(|e| MiradorError::collection(e.to_string()))
        }

        async fn wait_network_idle(&self) -> MiradorResult<()> {
            let mut last = -1_i64;
            let mut quiet = Duration::ZERO;
            loop {
                let count: i64 = self.eval(RESOURCE_COUNT_JS.to_string()).await?;
                if count >= 0 && count == last {
                    quiet += POLL_INTERVAL;
                    if quiet >= NETWORK_IDLE_QUIET {
                        return Ok(());
                    }
                } else {
                    quiet = Duration::ZERO;
                    last = count;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    fn console_event(event: &EventConsoleApiCalled) -> PageEvent {
        let kind = match event.r#type {
            ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => EventKind::Error,
            ConsoleApiCalledType::Warning => EventKind::Warning,
            ConsoleApiCalledType::Info => EventKind::Info,
            _ => EventKind::Log,
        };
        let text = event
            .args
            .iter()
            .map(|arg| match &arg.value {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => arg.description.clone().unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        let mut page_event = PageEvent::new(kind, text);
        if let Some(frame) = event
            .stack_trace
            .as_ref()
            .and_then(|st| st.call_frames.first())
        {
            page_event = page_event.with_source(frame.url.clone());
        }
        page_event
    }

    /// Events the listeners already hold, in emission order
    fn drain_ready(
        console: &mut CdpEventStream<EventConsoleApiCalled>,
        exceptions: &mut CdpEventStream<EventExceptionThrown>,
    ) -> Vec<PageEvent> {
        let mut pending = Vec::new();
        while let Some(Some(e)) = console.next().now_or_never() {
            pending.push(console_event(&e));
        }
        while let Some(Some(e)) = exceptions.next().now_or_never() {
            pending.push(exception_event(&e));
        }
        pending.sort_by_key(|e| e.timestamp);
        pending
    }

    fn exception_event(event: &EventExceptionThrown) -> PageEvent {
        let details = &event.exception_details;
        let text = details
            .exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| details.text.clone());
        let mut page_event = PageEvent::new(EventKind::PageError, text);
        if let Some(url) = &details.url {
            page_event = page_event.with_source(url.clone());
        }
        page_event
    }

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn navigate(&mut self, url: &str, readiness: Readiness) -> MiradorResult<()> {
            if self.closed {
                return Err(MiradorError::collection("page handle is closed"));
            }
            self.ready = None;
            {
                let page = self.inner.lock().await;
                page.goto(url).await.map_err(|e| MiradorError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            }
            match readiness {
                Readiness::Load => {}
                Readiness::Delay(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                Readiness::NetworkIdle => self.wait_network_idle().await?,
            }
            debug!(%url, %readiness, "page ready");
            self.ready = Some(readiness);
            Ok(())
        }

        fn ready_state(&self) -> Option<Readiness> {
            if self.closed {
                None
            } else {
                self.ready
            }
        }

        async fn subscribe(&mut self) -> MiradorResult<EventStream> {
            let subscription_error = |e: chromiumoxide::error::CdpError| MiradorError::Subscription {
                message: e.to_string(),
            };
            let page = self.inner.lock().await.clone();
            page.execute(EnableParams::default())
                .await
                .map_err(subscription_error)?;
            let mut console = page
                .event_listener::<EventConsoleApiCalled>()
                .await
                .map_err(subscription_error)?;
            let mut exceptions = page
                .event_listener::<EventExceptionThrown>()
                .await
                .map_err(subscription_error)?;

            let (tx, rx) = mpsc::unbounded_channel();
            let (flush_tx, mut flush_rx) = mpsc::unbounded_channel::<oneshot::Sender<()>>();
            let handle = tokio::spawn(async move {
                loop {
                    let (events, ack) = tokio::select! {
                        biased;
                        Some(ack) = flush_rx.recv() => {
                            (drain_ready(&mut console, &mut exceptions), Some(ack))
                        }
                        Some(e) = console.next() => (vec![console_event(&e)], None),
                        Some(e) = exceptions.next() => (vec![exception_event(&e)], None),
                        else => break,
                    };
                    let delivered = events.into_iter().all(|event| tx.send(event).is_ok());
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    if !delivered {
                        debug!("recording stopped, event forwarder exiting");
                        break;
                    }
                }
            });
            self.listeners.push(handle);
            self.flushers.push(flush_tx);
            Ok(rx)
        }

        async fn flush_events(&mut self) -> MiradorResult<()> {
            self.flushers.retain(|f| !f.is_closed());
            for flusher in &self.flushers {
                let (ack_tx, ack_rx) = oneshot::channel();
                if flusher.send(ack_tx).is_err() {
                    continue;
                }
                if ack_rx.await.is_err() {
                    warn!("event forwarder exited before acknowledging a flush");
                }
            }
            Ok(())
        }

        async fn query(&self, query: &ElementQuery) -> MiradorResult<Vec<RawElement>> {
            self.eval(query_js(query)?).await
        }

        async fn count(&self, locator: &Locator) -> MiradorResult<usize> {
            self.eval(format!("({}).length", locator.to_elements_expr()))
                .await
        }

        async fn document(&self) -> MiradorResult<DocumentState> {
            self.eval(DOCUMENT_JS.to_string()).await
        }

        async fn click(&mut self, locator: &Locator, index: usize) -> MiradorResult<()> {
            let script = click_js(locator, index);
            loop {
                let status: String = self.eval(script.clone()).await.map_err(|e| {
                    MiradorError::Interaction {
                        target: format!("{locator} #{index}"),
                        message: e.to_string(),
                    }
                })?;
                if status == "clicked" {
                    return Ok(());
                }
                debug!(%locator, index, %status, "waiting for element to become actionable");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        async fn pause(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn screenshot(&self) -> MiradorResult<Vec<u8>> {
            let page = self.inner.lock().await;
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();

            let screenshot = page
                .execute(params)
                .await
                .map_err(|e| MiradorError::Screenshot {
                    message: e.to_string(),
                })?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| MiradorError::Screenshot {
                    message: e.to_string(),
                })
        }

        async fn close(&mut self) -> MiradorResult<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            self.ready = None;
            self.flushers.clear();
            for listener in self.listeners.drain(..) {
                listener.abort();
            }
            let page = self.inner.lock().await.clone();
            if let Err(e) = page.close().await {
                warn!(error = %e, "page close failed");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumBrowser, ChromiumDriver};
