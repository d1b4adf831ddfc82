//! Client for the hosted backend's REST interface
//!
//! Tables live under `{url}/rest/v1/{table}`. Filters are query parameters of the
//! form `column=op.value`; inserts, upserts and updates ask for the affected
//! rows back through the `Prefer` header. Deletes only ask for a count, which
//! arrives in `Content-Range`.

use super::query::{filter_params, Filter, Query};
use super::{PersistenceError, PersistenceResult, TableBackend};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;
use zeroize::Zeroizing;

const USER_AGENT: &str = "airo/0.1.0";
const RETURN_ROWS: &str = "return=representation";
const UPSERT_RETURN_ROWS: &str = "resolution=merge-duplicates,return=representation";
const RETURN_COUNT: &str = "return=minimal,count=exact";

/// Error body returned by the REST layer
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct PostgrestBackend {
    client: Client,
    base: Url,
    api_key: Zeroizing<String>,
}

impl std::fmt::Debug for PostgrestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestBackend")
            .field("base", &self.base.as_str())
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl PostgrestBackend {
    pub fn new(config: &BackendConfig) -> PersistenceResult<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| PersistenceError::InvalidEndpoint(format!("{}: {}", config.url, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(PersistenceError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base,
            api_key: config.api_key.clone(),
        })
    }

    /// `{base}/rest/v1/{table}` with `params` as the query string
    pub fn table_url(&self, table: &str, params: &[(String, String)]) -> PersistenceResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| PersistenceError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(&["rest", "v1", table]);

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url)
    }

    fn request(&self, method: Method, url: Url, prefer: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.as_str()))
            .header(CONTENT_TYPE, "application/json");

        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }

        request
    }

    async fn send(&self, request: RequestBuilder) -> PersistenceResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_error(status.as_u16(), &body));
        }

        Ok(response)
    }

    async fn execute(&self, request: RequestBuilder) -> PersistenceResult<Vec<Value>> {
        let body = self.send(request).await?.text().await?;
        parse_rows(&body)
    }
}

/// Decode a success body into rows; empty bodies mean no rows
pub fn parse_rows(body: &str) -> PersistenceResult<Vec<Value>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(body)? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

/// Total from a `Content-Range` header such as `0-4/5` or `*/0`
pub fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Build a `Remote` error from a failed response, keeping the backend error code
pub fn remote_error(status: u16, body: &str) -> PersistenceError {
    match serde_json::from_str::<RemoteErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed.message.unwrap_or_else(|| body.to_string());
            if let Some(details) = parsed.details {
                message = format!("{} ({})", message, details);
            }
            PersistenceError::Remote {
                status,
                code: parsed.code,
                message,
            }
        }
        Err(_) => PersistenceError::Remote {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}

#[async_trait]
impl TableBackend for PostgrestBackend {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>> {
        let url = self.table_url(table, &[])?;
        let request = self
            .request(Method::POST, url, Some(RETURN_ROWS))
            .json(&Value::Array(rows));
        self.execute(request).await
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>> {
        let url = self.table_url(table, &[])?;
        let request = self
            .request(Method::POST, url, Some(UPSERT_RETURN_ROWS))
            .json(&Value::Array(rows));
        self.execute(request).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> PersistenceResult<Vec<Value>> {
        let url = self.table_url(table, &filter_params(filters))?;
        let request = self
            .request(Method::PATCH, url, Some(RETURN_ROWS))
            .json(&patch);
        self.execute(request).await
    }

    async fn select(&self, table: &str, query: &Query) -> PersistenceResult<Vec<Value>> {
        let url = self.table_url(table, &query.to_params())?;
        let request = self.request(Method::GET, url, None);
        self.execute(request).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> PersistenceResult<usize> {
        let url = self.table_url(table, &filter_params(filters))?;
        let request = self.request(Method::DELETE, url, Some(RETURN_COUNT));
        let response = self.send(request).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total);
        match total {
            Some(count) => Ok(count),
            None => Ok(parse_rows(&response.text().await?)?.len()),
        }
    }
}
