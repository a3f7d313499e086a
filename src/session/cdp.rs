//! Chrome DevTools Protocol session. Attaches to an already-running Chrome
//! started with `--remote-debugging-port`; never launches or kills the
//! browser itself.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{BrowserSession, Container, PageLink, SessionConfig};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);
/// How long to wait for `document.readyState` after a navigation before
/// proceeding anyway.
const NAV_WAIT: Duration = Duration::from_secs(30);
const NAV_POLL: Duration = Duration::from_millis(500);

/// One entry from the DevTools `/json` target list.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugTarget {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

/// List attachable targets from the debug endpoint.
pub async fn list_targets(config: &SessionConfig) -> Result<Vec<DebugTarget>> {
    let endpoint = format!("http://{}:{}/json", config.host, config.port);
    let targets = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("no Chrome debug endpoint at {endpoint}"))?
        .json::<Vec<DebugTarget>>()
        .await
        .context("unexpected response from debug endpoint")?;
    Ok(targets)
}

pub struct CdpSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl CdpSession {
    /// Attach to a page target. With no configured target id, the first
    /// page-type target wins.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let targets = list_targets(config).await?;
        let target = targets
            .iter()
            .find(|t| match &config.target_id {
                Some(id) => &t.id == id,
                None => t.kind == "page" && t.ws_url.is_some(),
            })
            .ok_or_else(|| anyhow!("no attachable page target on port {}", config.port))?;
        let ws_url = target
            .ws_url
            .as_ref()
            .ok_or_else(|| anyhow!("target {} has no debugger URL", target.id))?;

        info!("attaching to tab: {}", target.title);
        let (ws, _) = connect_async(ws_url.as_str())
            .await
            .with_context(|| format!("websocket connect failed: {ws_url}"))?;

        Ok(Self { ws, next_id: 0 })
    }

    /// Send one CDP command and wait for the reply with the matching id,
    /// discarding interleaved protocol events.
    async fn command(&mut self, method: &str, params: Value) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let msg = json!({ "id": id, "method": method, "params": params });
        self.ws.send(Message::Text(msg.to_string().into())).await?;

        let reply = tokio::time::timeout(COMMAND_TIMEOUT, async {
            loop {
                let Some(frame) = self.ws.next().await else {
                    bail!("devtools connection closed");
                };
                match frame? {
                    Message::Text(text) => {
                        let value: Value = serde_json::from_str(text.as_str())?;
                        if value.get("id").and_then(Value::as_u64) == Some(id) {
                            if let Some(err) = value.get("error") {
                                bail!("{method} failed: {err}");
                            }
                            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
                        }
                        // Unsolicited event; not ours.
                    }
                    Message::Close(_) => bail!("devtools connection closed"),
                    _ => {}
                }
            }
        })
        .await
        .map_err(|_| anyhow!("{method} timed out"))??;

        Ok(reply)
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            bail!("script threw: {exception}");
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn eval_string(&mut self, expression: &str) -> Result<String> {
        Ok(self
            .evaluate(expression)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

impl BrowserSession for CdpSession {
    async fn current_url(&mut self) -> Result<String> {
        self.eval_string("window.location.href").await
    }

    async fn title(&mut self) -> Result<String> {
        self.eval_string("document.title").await
    }

    async fn body_text(&mut self) -> Result<String> {
        self.eval_string("document.body ? document.body.innerText : ''")
            .await
    }

    async fn page_source(&mut self) -> Result<String> {
        self.eval_string("document.documentElement.outerHTML").await
    }

    async fn query_containers(&mut self, selector: &str) -> Result<Vec<Container>> {
        let script = format!(
            r#"(() => {{
                const out = [];
                for (const el of document.querySelectorAll({sel})) {{
                    const h = el.querySelector('h3, h2, .property-title, .listing-title, [class*="title"]');
                    out.push({{
                        text: el.innerText || '',
                        heading: h ? h.innerText.trim() : null,
                        links: Array.from(el.querySelectorAll('a')).map(a => a.href),
                        images: Array.from(el.querySelectorAll('img')).map(i => i.src),
                    }});
                }}
                return out;
            }})()"#,
            sel = js_string(selector),
        );
        let value = self.evaluate(&script).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn query_links(&mut self, selector: &str) -> Result<Vec<PageLink>> {
        let script = format!(
            r#"Array.from(document.querySelectorAll({sel}))
                .filter(a => a.href)
                .map(a => ({{ text: (a.innerText || '').trim(), href: a.href }}))"#,
            sel = js_string(selector),
        );
        let value = self.evaluate(&script).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigating to {url}");
        self.command("Page.navigate", json!({ "url": url })).await?;

        // Bounded readiness wait; an anti-bot interstitial may never settle,
        // so proceed after the budget either way.
        let deadline = tokio::time::Instant::now() + NAV_WAIT;
        while tokio::time::Instant::now() < deadline {
            if let Ok(state) = self.eval_string("document.readyState").await {
                if state == "complete" {
                    return Ok(());
                }
            }
            tokio::time::sleep(NAV_POLL).await;
        }
        debug!("navigation wait budget spent, continuing");
        Ok(())
    }

    async fn eval(&mut self, script: &str) -> Result<Value> {
        self.evaluate(script).await
    }

    async fn close(&mut self) -> Result<()> {
        // Detach only; the user's browser keeps running.
        let _ = self.ws.close(None).await;
        Ok(())
    }
}

/// Quote a selector for safe embedding in a script.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a[title="Next"]"#), r#""a[title=\"Next\"]""#);
    }

    #[test]
    fn target_list_parses() {
        let raw = r#"[
            {"id":"abc","type":"page","title":"PropertyGuru","url":"https://www.propertyguru.com.sg/","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/abc"},
            {"id":"def","type":"service_worker","title":"","url":""}
        ]"#;
        let targets: Vec<DebugTarget> = serde_json::from_str(raw).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].kind, "page");
        assert!(targets[0].ws_url.is_some());
        assert!(targets[1].ws_url.is_none());
    }
}
