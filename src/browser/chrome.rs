// spider_chrome re-exports chromiumoxide API
use super::overlay::{js_string, HighlightOverlay, NODE_AT};
use crate::dom::{BoundingBox, Document, DomSnapshot, NodeId};
use crate::error::{GuideError, Result};
use crate::fingerprint::SCAN_ID_ATTR;
use crate::host::{NavigationType, PageHost};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::layout::Point;
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};

/// Serializes the live DOM into a [`DomSnapshot`].
const CAPTURE_SCRIPT: &str = include_str!("capture.js");

const LAUNCH_HELP: &str = "\n\n\
    Chrome not found. You can:\n\
    - Install Chrome: https://www.google.com/chrome/\n\
    - Ubuntu/Debian: sudo apt install chromium-browser\n\
    - Fedora: sudo dnf install chromium\n\
    - macOS: brew install --cask google-chrome\n\
    - Or specify path: --chrome-path /path/to/chrome\n\
    - Linux sandbox issue? Try: --no-sandbox";

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
    overlay: HighlightOverlay,
}

/// Connection mode for Chrome browser
pub enum ConnectionMode {
    /// Launches Chrome, downloading Chrome for Testing when no path is given
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Connects to an existing Chrome on its debug port
    DebugPort(u16),
}

impl ChromeDriver {
    /// The active page, skipping Chrome's own `chrome://` pages.
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| GuideError::Other(format!("Failed to create page: {}", e)))
    }

    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // unique profile per instance
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir = std::env::temp_dir().join(format!("guideme-chrome-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    GuideError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                } else {
                    match Self::ensure_chrome_installed().await {
                        Ok(path) => config = config.chrome_executable(path),
                        Err(e) => log::warn!("Chrome download failed ({}), trying system Chrome", e),
                    }
                }

                let config = config
                    .build()
                    .map_err(|e| GuideError::LaunchFailed(format!("{}.{}", e, LAUNCH_HELP)))?;
                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| GuideError::LaunchFailed(format!("{}.{}", e, LAUNCH_HELP)))?;

                tokio::spawn(async move { while (handler.next().await).is_some() {} });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    GuideError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                         Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move { while (handler.next().await).is_some() {} });

                (browser, None)
            }
        };

        Ok(Self {
            browser,
            temp_dir,
            overlay: HighlightOverlay::new("#4f46e5"),
        })
    }

    pub fn with_highlight_color(mut self, color: &str) -> Self {
        self.overlay = HighlightOverlay::new(color);
        self
    }

    /// Navigate the active page and wait for its load event.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        let normalized_url = if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };
        log::info!("navigating to {}", normalized_url);

        let page = self.get_active_page().await?;
        let mut loaded = page.event_listener::<EventLoadEventFired>().await?;

        let params = NavigateParams::builder()
            .url(&normalized_url)
            .build()
            .map_err(|e| GuideError::NavigationFailed(format!("Invalid URL {}: {}", normalized_url, e)))?;
        let response = page.execute(params).await.map_err(|e| {
            if e.to_string().contains("oneshot canceled") {
                GuideError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed.".to_string(),
                )
            } else {
                GuideError::NavigationFailed(format!("Failed to navigate to {}: {}", normalized_url, e))
            }
        })?;
        if let Some(error_text) = response.result.error_text {
            return Err(GuideError::NavigationFailed(format!("Navigation error: {}", error_text)));
        }

        match tokio::time::timeout(std::time::Duration::from_secs(30), loaded.next()).await {
            Ok(_) => log::debug!("load event fired for {}", normalized_url),
            Err(_) => {
                return Err(GuideError::NavigationFailed(format!(
                    "Timed out waiting for {} to load",
                    normalized_url
                )))
            }
        }
        Ok(())
    }

    /// Evaluate a script and deserialize its result.
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let page = self.get_active_page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| GuideError::Other(format!("Script execution failed: {}", e)))?;
        result
            .into_value()
            .map_err(|e| GuideError::Other(format!("Failed to deserialize result: {}", e)))
    }

    fn node_index(doc: &Document, node: NodeId) -> Result<usize> {
        doc.preorder_index(node)
            .ok_or_else(|| GuideError::ElementNotFound(format!("node {}", node.0)))
    }

    /// Ensure Chrome is installed, downloading if necessary
    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| GuideError::Other("Cannot determine cache directory".to_string()))?
            .join("guideme")
            .join("chrome");

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| GuideError::Other(format!("Failed to create cache dir: {}", e)))?;

        let marker = cache_dir.join(".downloaded");
        if marker.exists() {
            if let Some(executable) = Self::find_chrome_in_cache(&cache_dir) {
                return Ok(executable);
            }
        }

        log::info!("downloading Chrome for Testing into {}", cache_dir.display());
        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| GuideError::Other(format!("Fetcher config failed: {}", e)))?,
        );
        let info = fetcher
            .fetch()
            .await
            .map_err(|e| GuideError::Other(format!("Chrome download failed: {}", e)))?;

        tokio::fs::write(&marker, "downloaded")
            .await
            .map_err(|e| GuideError::Other(format!("Failed to write marker: {}", e)))?;

        Ok(info.executable_path)
    }

    fn find_chrome_in_cache(cache_dir: &Path) -> Option<PathBuf> {
        [
            "chrome",
            "chrome.exe",
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "chrome-linux/chrome",
            "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
            "chrome-win/chrome.exe",
        ]
        .iter()
        .map(|p| cache_dir.join(p))
        .find(|p| p.exists())
    }
}

/// Script writing every scan id of `doc` onto the live page and clearing
/// stale ones. Elements are addressed by pre-order index.
fn sync_script(doc: &Document) -> String {
    let ids: Vec<(usize, &str)> = doc
        .all_elements()
        .into_iter()
        .enumerate()
        .filter_map(|(i, n)| doc.attr(n, SCAN_ID_ATTR).map(|id| (i, id)))
        .collect();
    let pairs = serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  for (const el of document.querySelectorAll('[' + {attr} + ']')) el.removeAttribute({attr});
  {node_at}
  let applied = 0;
  for (const [index, id] of {pairs}) {{
    const el = __guidemeNodeAt(index);
    if (el) {{ el.setAttribute({attr}, id); applied++; }}
  }}
  return applied;
}})()"#,
        attr = js_string(SCAN_ID_ATTR),
        node_at = NODE_AT,
        pairs = pairs,
    )
}

fn type_script(index: usize, text: &str) -> String {
    format!(
        r#"(() => {{
  {node_at}
  const el = __guidemeNodeAt({index});
  if (!el) return false;
  el.focus();
  if ('value' in el) {{
    el.value = {text};
  }} else {{
    el.textContent = {text};
  }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        node_at = NODE_AT,
        index = index,
        text = js_string(text),
    )
}

#[async_trait]
impl PageHost for ChromeDriver {
    async fn capture(&self) -> Result<Document> {
        let snapshot: DomSnapshot = self.evaluate(CAPTURE_SCRIPT.to_string()).await?;
        Ok(Document::from(snapshot))
    }

    async fn sync_scan_ids(&self, doc: &Document) -> Result<()> {
        let applied: usize = self.evaluate(sync_script(doc)).await?;
        log::debug!("applied {} scan ids to the live page", applied);
        Ok(())
    }

    async fn click(&self, doc: &Document, node: NodeId) -> Result<()> {
        let el = doc
            .get(node)
            .ok_or_else(|| GuideError::ElementNotFound(format!("node {}", node.0)))?;
        let (x, y) = el.bounds.center();
        let page = self.get_active_page().await?;
        page.click(Point { x, y }).await?;
        Ok(())
    }

    async fn type_text(&self, doc: &Document, node: NodeId, text: &str) -> Result<()> {
        let index = Self::node_index(doc, node)?;
        let typed: bool = self.evaluate(type_script(index, text)).await?;
        if !typed {
            return Err(GuideError::ElementNotFound(format!("node {}", node.0)));
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;
        page.url()
            .await
            .map_err(|e| GuideError::Other(e.to_string()))?
            .ok_or(GuideError::NoPage)
    }

    async fn navigation_type(&self) -> Result<NavigationType> {
        let kind: String = self
            .evaluate(
                "(() => { const e = performance.getEntriesByType('navigation')[0]; return e ? e.type : 'navigate'; })()"
                    .to_string(),
            )
            .await?;
        Ok(NavigationType::from_timing_type(&kind))
    }

    async fn highlight(&self, bounds: BoundingBox, label: &str) -> Result<()> {
        let page = self.get_active_page().await?;
        self.overlay.show(&page, bounds, label).await
    }

    async fn clear_highlight(&self) -> Result<()> {
        let page = self.get_active_page().await?;
        self.overlay.clear(&page).await
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    #[test]
    fn test_sync_script_lists_preorder_ids() {
        let mut doc = Document::new("https://example.com/", "t");
        let body = doc.body();
        let a = doc.append(body, Element::new("button").text("A"));
        doc.append(body, Element::new("div"));
        doc.set_attr(a, SCAN_ID_ATTR, "gm-1");
        let script = sync_script(&doc);
        assert!(script.contains(r#"[[2,"gm-1"]]"#));
        assert!(script.contains("__guidemeNodeAt"));
    }

    #[test]
    fn test_type_script_escapes_text() {
        let script = type_script(4, "it's \"quoted\"");
        assert!(script.contains(r#"__guidemeNodeAt(4)"#));
        assert!(script.contains(r#""it's \"quoted\"""#));
    }
}
