//! Spreadsheet-backed expense ledger
//!
//! The ledger lives in a Google Sheets range (default `Gastos!A:E`) with the
//! columns date, message, amount, category and one unused column. The first
//! row is a header. Rows are only ever appended.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::types::NewEntry;
use crate::window::format_timestamp;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_RANGE: &str = "Gastos!A:E";

/// Failures talking to the spreadsheet API
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("sheets auth failed: {0}")]
    Auth(String),
    #[error("sheets request failed with status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid sheets url: {0}")]
    Url(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Append-only row store the bot keeps its expenses in
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Every row of the ledger range, header included, as display strings
    async fn read_all(&self) -> Result<Vec<Vec<String>>>;

    /// Append one expense row
    async fn append(&self, entry: &NewEntry) -> Result<()>;
}

/// Source of OAuth access tokens for the Sheets API
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Access tokens minted from a Google service-account key file
pub struct ServiceAccountTokens {
    auth: yup_oauth2::authenticator::DefaultAuthenticator,
}

impl ServiceAccountTokens {
    pub async fn from_key_file(path: &Path) -> Result<Self> {
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .with_context(|| format!("Failed to read service account key {}", path.display()))?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .context("Failed to build service account authenticator")?;
        Ok(Self { auth })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .auth
            .token(&[SHEETS_SCOPE])
            .await
            .map_err(|e| LedgerError::Auth(e.to_string()))?;
        let token = token
            .token()
            .ok_or_else(|| LedgerError::Auth("no access token in response".to_string()))?;
        Ok(token.to_string())
    }
}

/// Fixed bearer token, for emulators and tests
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Google Sheets v4 values API client
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    tokens: Box<dyn TokenSource>,
}

impl std::fmt::Debug for SheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsStore")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .finish()
    }
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: String,
        range: String,
        tokens: Box<dyn TokenSource>,
    ) -> Result<Self> {
        Self::with_base_url(DEFAULT_SHEETS_BASE_URL.to_string(), spreadsheet_id, range, tokens)
    }

    pub fn with_base_url(
        base_url: String,
        spreadsheet_id: String,
        range: String,
        tokens: Box<dyn TokenSource>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for Sheets")?;
        Ok(Self {
            client,
            base_url,
            spreadsheet_id,
            range,
            tokens,
        })
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}` with each segment escaped
    fn values_url(&self, suffix: &str) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| LedgerError::Url(e.to_string()))?;
        let range = format!("{}{}", self.range, suffix);
        url.path_segments_mut()
            .map_err(|_| LedgerError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(LedgerError::Http {
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

#[async_trait]
impl LedgerStore for SheetsStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let url = self.values_url("")?;
        let token = self.tokens.access_token().await?;
        debug!("Sheets read: {}", self.range);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("dateTimeRenderOption", "SERIAL_NUMBER"),
            ])
            .send()
            .await
            .context("Failed to send request to Sheets API")?;

        let body: ValueRange = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse Sheets values response")?;

        debug!("Sheets read returned {} rows", body.values.len());
        Ok(rows_to_strings(body.values))
    }

    async fn append(&self, entry: &NewEntry) -> Result<()> {
        let url = self.values_url(":append")?;
        let token = self.tokens.access_token().await?;
        debug!("Sheets append: {} ({})", entry.amount, self.range);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&append_body(entry))
            .send()
            .await
            .context("Failed to send append to Sheets API")?;

        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Request body for a single-row append; the category cell is left out
fn append_body(entry: &NewEntry) -> Value {
    serde_json::json!({
        "values": [[
            format_timestamp(entry.timestamp),
            entry.raw_message,
            entry.amount,
        ]]
    })
}

fn rows_to_strings(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect()
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => if b { "TRUE" } else { "FALSE" }.to_string(),
        other => other.to_string(),
    }
}

/// In-process ledger used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<Vec<String>>>,
    reads: AtomicUsize,
    failing: bool,
}

impl MemoryLedger {
    /// Empty ledger with just the header row
    pub fn new() -> Self {
        Self::with_rows(vec![vec![
            "Fecha".to_string(),
            "Mensaje".to_string(),
            "Monto".to_string(),
            "Categoría".to_string(),
        ]])
    }

    /// Ledger preloaded with `rows`, the first of which is the header
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    /// Ledger whose every call fails, to exercise error paths
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> Result<()> {
        if self.failing {
            return Err(LedgerError::Unavailable("memory ledger set to fail".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.unavailable()?;
        Ok(self.rows())
    }

    async fn append(&self, entry: &NewEntry) -> Result<()> {
        self.unavailable()?;
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| LedgerError::Unavailable("memory ledger poisoned".to_string()))?;
        rows.push(vec![
            format_timestamp(entry.timestamp),
            entry.raw_message.clone(),
            entry.amount.clone(),
        ]);
        Ok(())
    }
}
