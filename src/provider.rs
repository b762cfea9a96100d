use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TallyError};

/// One transaction as delivered by the provider's change feed.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTxn {
    pub transaction_id: String,
    pub account_id: String,
    /// Signed: positive is money out (debit), negative is money in.
    pub amount: f64,
    pub name: String,
    pub merchant_name: Option<String>,
    /// ISO date, YYYY-MM-DD.
    pub date: String,
    pub pending: bool,
    pub category_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemovedTxn {
    pub transaction_id: String,
}

/// One page of the incremental change feed. `next_cursor` is an opaque
/// token owned by the provider; it is stored and echoed back, never parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct TxnPage {
    pub added: Vec<RemoteTxn>,
    pub modified: Vec<RemoteTxn>,
    pub removed: Vec<RemovedTxn>,
    pub next_cursor: String,
    pub has_more: bool,
}

/// Incremental-changes API of the remote ledger provider.
pub trait LedgerClient {
    /// Fetch the next page after `cursor` (None means from the beginning).
    fn fetch_page(&self, access_token: &str, cursor: Option<&str>) -> Result<TxnPage>;
}

const FETCH_TIMEOUT_SECS: u64 = 30;

pub struct HttpLedgerClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        if base_url.is_empty() {
            return Err(TallyError::Settings(
                "provider_url is not set; edit settings.json or re-run `tally init`".to_string(),
            ));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl LedgerClient for HttpLedgerClient {
    fn fetch_page(&self, access_token: &str, cursor: Option<&str>) -> Result<TxnPage> {
        let body = serde_json::json!({
            "access_token": access_token,
            "cursor": cursor,
        });
        let response = self
            .http
            .post(format!("{}/transactions/sync", self.base_url))
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().unwrap_or_default();
            return Err(TallyError::Provider(format!("{status}: {detail}")));
        }
        Ok(response.json::<TxnPage>()?)
    }
}
