use crate::engine::{ChatRequest, ChatTransport, ChunkStream};
use crate::tickets::{
    Escalation, EscalationCreated, EscalationRequest, Ticket, TicketCreated, TicketDraft,
};
use anyhow::Result;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Percent-encode a query parameter value.
fn encode_param(s: &str) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

/// HTTP client for the service desk backend.
#[derive(Clone)]
pub struct DeskClient {
    base_url: String,
    client: Client,
}

impl DeskClient {
    pub fn new(base_url: &str) -> Self {
        // No overall timeout: chat responses stream for as long as the
        // assistant keeps talking. Stalls are bounded per turn instead.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health_check(&self) -> bool {
        self.client
            .get(self.url("/health"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn health(&self) -> Result<JsonValue> {
        let resp = self.client.get(self.url("/health")).send().await?;
        let resp = ensure_success(resp, "Health check").await?;
        Ok(resp.json().await?)
    }

    /// Start a chat turn and return the raw `text/event-stream` body.
    pub async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        debug!(
            "POST /chat: role={}, chars={}",
            request.role,
            request.message.chars().count()
        );
        let resp = self
            .client
            .post(self.url("/chat"))
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;
        let resp = ensure_success(resp, "Chat request").await?;
        let body: ChunkStream = Box::pin(
            resp.bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(anyhow::Error::from)),
        );
        Ok(body)
    }

    pub async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketCreated> {
        let resp = self
            .client
            .post(self.url("/tickets"))
            .json(draft)
            .send()
            .await?;
        let resp = ensure_success(resp, "Ticket creation").await?;
        let created: TicketCreated = resp.json().await?;
        info!(
            "Created ticket {} (suggested resolution: {})",
            created.ticket.id,
            created.suggested_resolution.is_some()
        );
        Ok(created)
    }

    pub async fn list_tickets(&self, status: Option<&str>) -> Result<Vec<Ticket>> {
        let mut url = self.url("/tickets");
        if let Some(status) = status {
            url.push_str(&format!("?status={}", encode_param(status)));
        }
        let resp = self.client.get(&url).send().await?;
        let resp = ensure_success(resp, "Ticket list").await?;
        Ok(resp.json().await?)
    }

    pub async fn get_ticket(&self, id: &str) -> Result<Ticket> {
        let url = self.url(&format!("/tickets/{}", encode_param(id)));
        let resp = self.client.get(&url).send().await?;
        let resp = ensure_success(resp, "Ticket lookup").await?;
        Ok(resp.json().await?)
    }

    pub async fn stats(&self) -> Result<JsonValue> {
        let resp = self.client.get(self.url("/stats")).send().await?;
        let resp = ensure_success(resp, "Stats request").await?;
        Ok(resp.json().await?)
    }

    pub async fn escalate(&self, request: &EscalationRequest) -> Result<EscalationCreated> {
        let resp = self
            .client
            .post(self.url("/escalate"))
            .json(request)
            .send()
            .await?;
        let resp = ensure_success(resp, "Escalation").await?;
        Ok(resp.json().await?)
    }

    pub async fn list_escalations(&self) -> Result<Vec<Escalation>> {
        let resp = self.client.get(self.url("/escalations")).send().await?;
        let resp = ensure_success(resp, "Escalation list").await?;
        Ok(resp.json().await?)
    }
}

async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} failed ({}): {}", what, status, text);
    }
    Ok(resp)
}

impl ChatTransport for DeskClient {
    fn open_chat(&self, request: ChatRequest) -> impl Future<Output = Result<ChunkStream>> + Send {
        async move { self.open_chat_stream(&request).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_param_escapes_reserved_bytes() {
        assert_eq!(encode_param("In Progress"), "In%20Progress");
        assert_eq!(encode_param("INC0012847"), "INC0012847");
        assert_eq!(encode_param("a&b=c/d"), "a%26b%3Dc%2Fd");
    }

    #[test]
    fn base_url_is_normalized() {
        let client = DeskClient::new("http://localhost:8001/");
        assert_eq!(client.base_url(), "http://localhost:8001");
        assert_eq!(client.url("/chat"), "http://localhost:8001/chat");
    }
}
