//! The live browser session the traversal drives. The core only ever talks to
//! the [`BrowserSession`] trait; the one real implementation attaches to an
//! already-running Chrome over its DevTools debug port.

pub mod cdp;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Where to find the Chrome debug endpoint. Passed in explicitly at
/// construction; there is no ambient connection file.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Attach to a specific target; otherwise the first page target wins.
    pub target_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9222,
            target_id: None,
        }
    }
}

/// One candidate listing subtree, captured as a value: rendered text, the
/// card heading if any, and the hrefs/srcs of nested anchors and images.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    pub text: String,
    pub heading: Option<String>,
    #[serde(rename = "links", default)]
    pub link_hrefs: Vec<String>,
    #[serde(rename = "images", default)]
    pub image_srcs: Vec<String>,
}

/// An anchor element's visible text and destination.
#[derive(Debug, Clone, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// The abilities the traversal core needs from a live page. One session is
/// owned exclusively by one traversal loop for its lifetime.
#[allow(async_fn_in_trait)]
pub trait BrowserSession {
    async fn current_url(&mut self) -> Result<String>;
    async fn title(&mut self) -> Result<String>;
    /// Visible text of the page body.
    async fn body_text(&mut self) -> Result<String>;
    /// Raw markup, for embedded-payload extraction.
    async fn page_source(&mut self) -> Result<String>;
    async fn query_containers(&mut self, selector: &str) -> Result<Vec<Container>>;
    async fn query_links(&mut self, selector: &str) -> Result<Vec<PageLink>>;
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// Run a script in the page and return its value.
    async fn eval(&mut self, script: &str) -> Result<Value>;
    /// Detach from the target. The browser itself stays up.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod fixture {
    //! In-memory session used by the traversal and cascade tests.

    use std::collections::HashMap;

    use anyhow::Result;
    use serde_json::Value;

    use super::{BrowserSession, Container, PageLink};

    #[derive(Debug, Clone, Default)]
    pub struct FixturePage {
        pub title: String,
        pub body_text: String,
        pub source: String,
        pub containers: HashMap<String, Vec<Container>>,
        pub links: HashMap<String, Vec<PageLink>>,
    }

    /// Serves canned pages keyed by URL and records every call made against
    /// it, so tests can assert which strategies actually ran.
    #[derive(Debug, Default)]
    pub struct FixtureSession {
        pub pages: HashMap<String, FixturePage>,
        pub url: String,
        pub calls: Vec<String>,
    }

    impl FixtureSession {
        pub fn new(start_url: &str) -> Self {
            Self {
                url: start_url.to_string(),
                ..Default::default()
            }
        }

        pub fn add_page(&mut self, url: &str, page: FixturePage) {
            self.pages.insert(url.to_string(), page);
        }

        fn page(&self) -> FixturePage {
            self.pages.get(&self.url).cloned().unwrap_or_default()
        }

        pub fn called(&self, name: &str) -> bool {
            self.calls.iter().any(|c| c == name)
        }
    }

    impl BrowserSession for FixtureSession {
        async fn current_url(&mut self) -> Result<String> {
            self.calls.push("current_url".into());
            Ok(self.url.clone())
        }

        async fn title(&mut self) -> Result<String> {
            self.calls.push("title".into());
            Ok(self.page().title)
        }

        async fn body_text(&mut self) -> Result<String> {
            self.calls.push("body_text".into());
            Ok(self.page().body_text)
        }

        async fn page_source(&mut self) -> Result<String> {
            self.calls.push("page_source".into());
            Ok(self.page().source)
        }

        async fn query_containers(&mut self, selector: &str) -> Result<Vec<Container>> {
            self.calls.push(format!("query_containers:{selector}"));
            Ok(self.page().containers.get(selector).cloned().unwrap_or_default())
        }

        async fn query_links(&mut self, selector: &str) -> Result<Vec<PageLink>> {
            self.calls.push(format!("query_links:{selector}"));
            Ok(self.page().links.get(selector).cloned().unwrap_or_default())
        }

        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.calls.push(format!("navigate:{url}"));
            self.url = url.to_string();
            Ok(())
        }

        async fn eval(&mut self, _script: &str) -> Result<Value> {
            self.calls.push("eval".into());
            Ok(Value::Null)
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.push("close".into());
            Ok(())
        }
    }
}
