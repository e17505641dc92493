//! The `bing_search` tool.

use crate::tools::{BuiltinToolName, Tool, ToolArgs, decode_args};
use anyhow::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::Write;
use std::str::FromStr;

use super::provider::{SearchProvider, SearchResult};

pub const DEFAULT_MARKET: &str = "de-DE";
const FULL_RESULT_COUNT: usize = 3;

/// How much of the result page to hand back to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseSize {
    /// Top three results with URL, title and description.
    #[default]
    Full,
    /// Snippet of the first result only.
    Compact,
}

impl FromStr for ResponseSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            other => anyhow::bail!("invalid response_size '{other}', expected 'full' or 'compact'"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BingSearchInput {
    query: String,
    market: Option<String>,
    response_size: Option<String>,
}

/// Web search tool backed by a [`SearchProvider`].
pub struct BingSearchTool<P: SearchProvider> {
    provider: P,
}

impl<P: SearchProvider> BingSearchTool<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Format results for the model.
fn format_search_results(query: &str, results: &[SearchResult], size: ResponseSize) -> String {
    let Some(first) = results.first() else {
        return format!("No results found for: {query}");
    };

    match size {
        ResponseSize::Compact => first.snippet.clone(),
        ResponseSize::Full => {
            let mut output = String::new();
            for result in results.iter().take(FULL_RESULT_COUNT) {
                let _ = write!(
                    output,
                    "URL: {}\nText: {}\nDescription: {}\n\n",
                    result.url, result.name, result.snippet
                );
            }
            output
        }
    }
}

impl<P> Tool for BingSearchTool<P>
where
    P: SearchProvider + 'static,
{
    type Name = BuiltinToolName;

    fn name(&self) -> BuiltinToolName {
        BuiltinToolName::BingSearch
    }

    fn description(&self) -> &'static str {
        "Search the web with Bing and return the top results."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query to search for."
                },
                "market": {
                    "type": "string",
                    "description": "The market code to search in, e.g. de-DE or en-US. Defaults to de-DE."
                },
                "response_size": {
                    "type": "string",
                    "enum": ["full", "compact"],
                    "description": "\"compact\" returns only the snippet of the first result, \"full\" returns the top three results."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let input: BingSearchInput = decode_args("bing_search", args)?;
        let size = input
            .response_size
            .as_deref()
            .map_or(Ok(ResponseSize::Full), ResponseSize::from_str)?;
        let market = input.market.as_deref().unwrap_or(DEFAULT_MARKET);

        log::debug!(
            "searching provider={} market={market} size={size:?}",
            self.provider.provider_name()
        );
        let response = self.provider.search(&input.query, market).await?;

        Ok(format_search_results(
            &response.query,
            &response.results,
            size,
        ))
    }
}
