//! Stock quotes.
//!
//! [`StockPriceTool`] answers `get_stock_price` using any [`QuoteProvider`];
//! [`YahooFinanceProvider`] reads the daily chart endpoint of Yahoo Finance.

use crate::tools::{BuiltinToolName, Tool, ToolArgs, decode_args};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = concat!("tasuku/", env!("CARGO_PKG_VERSION"));
const MAX_TICKER_LEN: usize = 16;

/// Source of closing prices.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Latest daily closing price of `ticker` in USD.
    ///
    /// # Errors
    ///
    /// Returns an error if the quote cannot be fetched or the ticker is unknown.
    async fn latest_close(&self, ticker: &str) -> Result<f64>;

    fn provider_name(&self) -> &'static str;
}

/// Yahoo Finance chart API provider.
#[derive(Clone, Debug)]
pub struct YahooFinanceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooFinanceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: YAHOO_CHART_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Yahoo chart API response structures
mod yahoo_api {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ChartResponse {
        pub chart: Chart,
    }

    #[derive(Debug, Deserialize)]
    pub struct Chart {
        pub result: Option<Vec<ChartResult>>,
        pub error: Option<ChartError>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChartError {
        pub code: String,
        pub description: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChartResult {
        pub meta: Option<ChartMeta>,
        pub indicators: Option<Indicators>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChartMeta {
        pub regular_market_price: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Indicators {
        #[serde(default)]
        pub quote: Vec<Quote>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Quote {
        #[serde(default)]
        pub close: Vec<Option<f64>>,
    }
}

/// Extract the latest close from a chart response body. Falls back to the
/// regular market price when the series has no values.
pub(crate) fn parse_chart_response(ticker: &str, body: &str) -> Result<f64> {
    let response: yahoo_api::ChartResponse =
        serde_json::from_str(body).context("Failed to parse Yahoo Finance response")?;

    if let Some(err) = response.chart.error {
        anyhow::bail!("Yahoo Finance error for {ticker}: {} ({})", err.description, err.code);
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("no chart data for {ticker}"))?;

    let close = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .and_then(|q| q.close.into_iter().rev().flatten().next());

    close
        .or_else(|| result.meta.and_then(|m| m.regular_market_price))
        .with_context(|| format!("no closing price for {ticker}"))
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    async fn latest_close(&self, ticker: &str) -> Result<f64> {
        let url = format!("{}/{ticker}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await
            .context("Failed to send request to Yahoo Finance")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Yahoo Finance response")?;

        // Unknown tickers come back as 404 with an error document.
        if !status.is_success() && !body.contains("\"chart\"") {
            anyhow::bail!("Yahoo Finance error: {status}");
        }
        parse_chart_response(ticker, &body)
    }

    fn provider_name(&self) -> &'static str {
        "yahoo"
    }
}

#[derive(Debug, Deserialize)]
struct StockPriceInput {
    ticker: String,
}

fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        anyhow::bail!("ticker must not be empty");
    }
    if ticker.len() > MAX_TICKER_LEN
        || !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        anyhow::bail!("invalid ticker '{raw}'");
    }
    Ok(ticker)
}

/// The `get_stock_price` tool.
pub struct StockPriceTool<Q: QuoteProvider> {
    quotes: Arc<Q>,
}

impl<Q: QuoteProvider> StockPriceTool<Q> {
    #[must_use]
    pub fn new(quotes: Q) -> Self {
        Self {
            quotes: Arc::new(quotes),
        }
    }
}

impl<Q> Tool for StockPriceTool<Q>
where
    Q: QuoteProvider + 'static,
{
    type Name = BuiltinToolName;

    fn name(&self) -> BuiltinToolName {
        BuiltinToolName::GetStockPrice
    }

    fn description(&self) -> &'static str {
        "Get the latest closing price of a stock in USD."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {
                    "type": "string",
                    "description": "The stock ticker symbol, e.g. MSFT or AAPL."
                }
            },
            "required": ["ticker"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let input: StockPriceInput = decode_args("get_stock_price", args)?;
        let ticker = normalize_ticker(&input.ticker)?;

        let price = self
            .quotes
            .latest_close(&ticker)
            .await
            .context("Something went wrong while getting the stock data!")?;

        Ok(format!("The latest closing price is {price:.2} USD"))
    }
}
