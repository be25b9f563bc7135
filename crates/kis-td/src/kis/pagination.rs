//! Continuation-key pagination for history listings.
//!
//! A response continues when its `tr_cont` header is `M` or `F` and its body
//! carries a non-empty `ctx_area_nk200`. The next request echoes both context
//! keys back as `CTX_AREA_FK200` / `CTX_AREA_NK200` and sends `tr_cont: N`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use kis_core::error::{KisError, Result};
use serde_json::Value;
use tracing::debug;

use super::rest::RestClient;
use super::router::RoutingDecision;
use super::token::TokenManager;

/// Pure pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    max_pages: u32,
    pages_fetched: u32,
    fk200: String,
    nk200: String,
    finished: bool,
}

impl PageCursor {
    pub fn new(max_pages: u32) -> Self {
        Self {
            max_pages,
            pages_fetched: 0,
            fk200: String::new(),
            nk200: String::new(),
            finished: max_pages == 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Context-key query parameters for the next request.
    pub fn request_params(&self) -> [(&'static str, String); 2] {
        [
            ("CTX_AREA_FK200", self.fk200.clone()),
            ("CTX_AREA_NK200", self.nk200.clone()),
        ]
    }

    /// `tr_cont` request header for the next request.
    pub fn request_tr_cont(&self) -> Option<&'static str> {
        (self.pages_fetched > 0).then_some("N")
    }

    /// Record a received page.
    pub fn advance(&mut self, tr_cont: Option<&str>, body: &Value) {
        self.pages_fetched += 1;
        self.fk200 = context_key(body, "ctx_area_fk200");
        self.nk200 = context_key(body, "ctx_area_nk200");

        let more = matches!(tr_cont.map(str::trim), Some("M" | "F")) && !self.nk200.is_empty();
        self.finished = !more || self.pages_fetched >= self.max_pages;
    }

    /// Start over from the first page.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_pages);
    }
}

fn context_key(body: &Value, field: &str) -> String {
    body.get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// A restartable sequence of raw response pages for one listing.
pub struct HistoryPages<'a> {
    rest: &'a RestClient,
    tokens: &'a TokenManager,
    decision: RoutingDecision,
    query: Vec<(&'static str, String)>,
    cursor: PageCursor,
    interval: Duration,
    clock: fn() -> DateTime<Utc>,
}

impl<'a> HistoryPages<'a> {
    pub fn new(
        rest: &'a RestClient,
        tokens: &'a TokenManager,
        decision: RoutingDecision,
        query: Vec<(&'static str, String)>,
        max_pages: u32,
        interval: Duration,
        clock: fn() -> DateTime<Utc>,
    ) -> Self {
        Self {
            rest,
            tokens,
            decision,
            query,
            cursor: PageCursor::new(max_pages),
            interval,
            clock,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Value>> {
        if self.cursor.is_finished() {
            return Ok(None);
        }
        if self.cursor.pages_fetched() > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }

        let credential = self.tokens.acquire_at((self.clock)().timestamp()).await?;
        let mut query = self.query.clone();
        query.extend(self.cursor.request_params());

        let resp = self
            .rest
            .get(&credential.access_token, &self.decision, &query, self.cursor.request_tr_cont())
            .await?;
        self.cursor.advance(resp.tr_cont.as_deref(), &resp.body);
        debug!(
            "[kis-pages] {} page {} (tr_cont={:?}, finished={})",
            self.decision.tr_id(),
            self.cursor.pages_fetched(),
            resp.tr_cont,
            self.cursor.is_finished()
        );
        Ok(Some(resp.body))
    }

    /// Rewind to the first page.
    pub fn restart(&mut self) {
        self.cursor.reset();
    }

    /// Fetch every remaining page.
    pub async fn collect_all(&mut self) -> Result<Vec<Value>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await? {
            pages.push(page);
        }
        Ok(pages)
    }

    /// The remaining pages as a stream. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> + 'a {
        stream::try_unfold(self, |mut pages| async move {
            let page = pages.next_page().await?;
            Ok::<_, KisError>(page.map(|page| (page, pages)))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_page_sends_no_continuation() {
        let cursor = PageCursor::new(10);
        assert_eq!(cursor.request_tr_cont(), None);
        assert_eq!(cursor.request_params()[1], ("CTX_AREA_NK200", String::new()));
        assert!(!cursor.is_finished());
    }

    #[test]
    fn continues_on_more_flag_with_next_key() {
        let mut cursor = PageCursor::new(10);
        cursor.advance(Some("M"), &json!({"ctx_area_fk200": "FK1 ", "ctx_area_nk200": " NK1"}));
        assert!(!cursor.is_finished());
        assert_eq!(cursor.request_tr_cont(), Some("N"));
        assert_eq!(
            cursor.request_params(),
            [("CTX_AREA_FK200", "FK1".to_string()), ("CTX_AREA_NK200", "NK1".to_string())]
        );
    }

    #[test]
    fn stops_on_done_flag_or_empty_key() {
        let mut cursor = PageCursor::new(10);
        cursor.advance(Some("D"), &json!({"ctx_area_nk200": "NK1"}));
        assert!(cursor.is_finished());

        let mut cursor = PageCursor::new(10);
        cursor.advance(Some("F"), &json!({"ctx_area_nk200": "   "}));
        assert!(cursor.is_finished());

        let mut cursor = PageCursor::new(10);
        cursor.advance(None, &json!({"ctx_area_nk200": "NK1"}));
        assert!(cursor.is_finished());
    }

    #[test]
    fn stops_at_page_limit_and_resets() {
        let mut cursor = PageCursor::new(2);
        let more = json!({"ctx_area_nk200": "NK"});
        cursor.advance(Some("M"), &more);
        assert!(!cursor.is_finished());
        cursor.advance(Some("M"), &more);
        assert!(cursor.is_finished());
        assert_eq!(cursor.pages_fetched(), 2);

        cursor.reset();
        assert_eq!(cursor, PageCursor::new(2));
        assert!(PageCursor::new(0).is_finished());
    }
}
