//! PostgREST data API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{RestClient, truncate_body};
use crate::db::query::{Direction, Filter};
use crate::db::{DataStore, Query, StoreError};

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "return=representation,resolution=merge-duplicates";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// PostgREST code for "single object requested, zero or many rows found".
const CODE_NO_SINGLE_ROW: &str = "PGRST116";
/// Postgres `unique_violation`.
const CODE_UNIQUE_VIOLATION: &str = "23505";

/// A [`DataStore`] backed by the hosted PostgREST API.
#[derive(Clone)]
pub struct RestStore {
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl RestStore {
    pub(super) const fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = map_store_error(status, &body);
            tracing::debug!(status = %status, error = %err, "Data API request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate_body(&body, 500),
                "Failed to parse data API response"
            );
            StoreError::DataCorruption(e)
        })
    }

    async fn write(&self, collection: &str, row: Value, prefer: &str) -> Result<Value, StoreError> {
        let url = self.client.rest_url().join(collection)?;
        let request = self
            .client
            .request(Method::POST, url)
            .await
            .header("Prefer", prefer)
            .json(&row);

        match self.execute(request).await? {
            Value::Array(rows) => rows.into_iter().next().ok_or_else(|| StoreError::Api {
                code: status_code(StatusCode::OK),
                message: "write returned no representation".to_owned(),
            }),
            row @ Value::Object(_) => Ok(row),
            other => Err(StoreError::Api {
                code: status_code(StatusCode::OK),
                message: format!("unexpected write response: {other}"),
            }),
        }
    }
}

#[async_trait]
impl DataStore for RestStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut url = self.client.rest_url().join(query.collection())?;
        url.query_pairs_mut().extend_pairs(encode_query(query));

        let request = self.client.request(Method::GET, url).await;
        match self.execute(request).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Api {
                code: status_code(StatusCode::OK),
                message: format!("expected a row array, got {other}"),
            }),
        }
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        self.write(collection, row, PREFER_REPRESENTATION).await
    }

    async fn upsert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        self.write(collection, row, PREFER_UPSERT).await
    }

    async fn fetch_single(&self, query: &Query) -> Result<Value, StoreError> {
        let mut url = self.client.rest_url().join(query.collection())?;
        url.query_pairs_mut()
            .extend_pairs(encode_query(&query.clone().limit(1)));

        let request = self
            .client
            .request(Method::GET, url)
            .await
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        self.execute(request).await
    }
}

/// Encode a query as PostgREST URL parameters.
pub(crate) fn encode_query(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();

    let select = query
        .columns()
        .map_or_else(|| "*".to_owned(), |columns| columns.join(","));
    params.push(("select".to_owned(), select));

    for filter in query.filters() {
        let value = match filter {
            Filter::Eq(_, Value::Null) => "is.null".to_owned(),
            Filter::Neq(_, Value::Null) => "not.is.null".to_owned(),
            Filter::Eq(_, v) => format!("eq.{}", render_value(v)),
            Filter::Neq(_, v) => format!("neq.{}", render_value(v)),
            Filter::Gte(_, v) => format!("gte.{}", render_value(v)),
            Filter::Lte(_, v) => format!("lte.{}", render_value(v)),
            Filter::ILike(_, pattern) => format!("ilike.{pattern}"),
        };
        params.push((filter.column().to_owned(), value));
    }

    if !query.ordering().is_empty() {
        let order = query
            .ordering()
            .iter()
            .map(|o| {
                let direction = match o.direction {
                    Direction::Ascending => "asc",
                    Direction::Descending => "desc",
                };
                format!("{}.{direction}", o.column)
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_owned(), order));
    }

    if let Some(limit) = query.row_limit() {
        params.push(("limit".to_owned(), limit.to_string()));
    }

    params
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a failed data API response to a [`StoreError`].
pub(crate) fn map_store_error(status: StatusCode, body: &str) -> StoreError {
    let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) else {
        return StoreError::Api {
            code: status_code(status),
            message: truncate_body(body, 200),
        };
    };

    let message = parsed
        .message
        .or(parsed.details)
        .unwrap_or_else(|| status.to_string());

    match parsed.code.as_deref() {
        Some(CODE_NO_SINGLE_ROW) => StoreError::NotFound,
        Some(CODE_UNIQUE_VIOLATION) => StoreError::Conflict(message),
        Some(code) => StoreError::Api {
            code: code.to_owned(),
            message,
        },
        None => StoreError::Api {
            code: status_code(status),
            message,
        },
    }
}

fn status_code(status: StatusCode) -> String {
    status.as_u16().to_string()
}
