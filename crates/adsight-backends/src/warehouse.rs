//! Client for the warehouse query gateway.
//!
//! The gateway fronts an asynchronous SQL engine: statements are submitted,
//! then polled by execution id until they reach a terminal state, after
//! which the result rows can be fetched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use adsight_core::backend::QueryBackend;
use adsight_core::config::WarehouseConfig;
use adsight_core::error::Result;
use adsight_core::types::{QueryHandle, QueryState, QueryStatus, ResultRows};

use crate::error::BackendError;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    query: &'a str,
    database: &'a str,
    output_location: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    query_execution_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    state: QueryState,
    #[serde(default)]
    state_change_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResultsResponse {
    rows: ResultRows,
}

#[derive(Debug, Clone)]
pub struct WarehouseClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    database: String,
    output_location: String,
}

impl WarehouseClient {
    pub fn new(config: &WarehouseConfig) -> std::result::Result<Self, BackendError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            database: config.database.clone(),
            output_location: config.output_location.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn query_url(&self, handle: &QueryHandle) -> String {
        format!("{}/v1/queries/{}", self.base_url, handle.0)
    }

    async fn checked(request: RequestBuilder) -> std::result::Result<reqwest::Response, BackendError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(BackendError::from_response(resp).await);
        }
        Ok(resp)
    }

    async fn submit_inner(&self, sql: &str) -> std::result::Result<QueryHandle, BackendError> {
        let body = SubmitRequest {
            query: sql,
            database: &self.database,
            output_location: &self.output_location,
        };
        let request = self
            .authorized(self.http.post(format!("{}/v1/queries", self.base_url)))
            .json(&body);
        let data: SubmitResponse = Self::checked(request).await?.json().await?;
        debug!(query_execution_id = %data.query_execution_id, "Query submitted");
        Ok(QueryHandle(data.query_execution_id))
    }

    async fn status_inner(
        &self,
        handle: &QueryHandle,
    ) -> std::result::Result<QueryStatus, BackendError> {
        let request = self.authorized(self.http.get(self.query_url(handle)));
        let data: StatusResponse = Self::checked(request).await?.json().await?;
        Ok(QueryStatus {
            state: data.state,
            reason: data.state_change_reason,
        })
    }

    async fn fetch_inner(&self, handle: &QueryHandle) -> std::result::Result<ResultRows, BackendError> {
        let request = self.authorized(
            self.http
                .get(format!("{}/results", self.query_url(handle))),
        );
        let data: ResultsResponse = Self::checked(request).await?.json().await?;
        Ok(data.rows)
    }

    async fn stop_inner(&self, handle: &QueryHandle) -> std::result::Result<(), BackendError> {
        let request = self.authorized(self.http.delete(self.query_url(handle)));
        Self::checked(request).await?;
        Ok(())
    }
}

#[async_trait]
impl QueryBackend for WarehouseClient {
    async fn submit(&self, sql: &str) -> Result<QueryHandle> {
        Ok(self.submit_inner(sql).await?)
    }

    async fn status(&self, handle: &QueryHandle) -> Result<QueryStatus> {
        Ok(self.status_inner(handle).await?)
    }

    async fn fetch(&self, handle: &QueryHandle) -> Result<ResultRows> {
        Ok(self.fetch_inner(handle).await?)
    }

    async fn stop(&self, handle: &QueryHandle) -> Result<()> {
        Ok(self.stop_inner(handle).await?)
    }
}
