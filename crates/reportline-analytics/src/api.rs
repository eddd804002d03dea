//! Analytics Reporting v4 client (`reports:batchGet`)

use reportline_core::{
    DateWindow, HttpConfig, PageRequest, ReportSource, Response, SourceError, block_on,
    build_client,
};
use serde_json::{Value, json};

pub const DEFAULT_API_URL: &str = "https://analyticsreporting.googleapis.com/v4/";

/// Longest error body quoted in an error message
const MAX_ERROR_BODY: usize = 300;

/// Blocking report source over the batchGet endpoint.
pub struct AnalyticsClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl AnalyticsClient {
    pub fn new(
        api_url: &str,
        access_token: impl Into<String>,
        http: &HttpConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            endpoint: batch_get_url(api_url),
            access_token: access_token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportSource for AnalyticsClient {
    fn fetch(
        &mut self,
        window: &DateWindow,
        requests: &[PageRequest<'_>],
    ) -> Result<Response, SourceError> {
        let body = batch_body(window, requests);
        let text = block_on(async {
            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await
                .map_err(SourceError::from_reqwest)?;
            let status = resp.status();
            let text = resp.text().await.map_err(SourceError::from_reqwest)?;
            if !status.is_success() {
                return Err(SourceError::Http {
                    status: Some(status.as_u16()),
                    message: error_message(&text),
                });
            }
            Ok::<_, SourceError>(text)
        })?;

        serde_json::from_str(&text).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

/// `{api_url}/reports:batchGet`, tolerating a missing trailing slash.
pub fn batch_get_url(api_url: &str) -> String {
    format!("{}/reports:batchGet", api_url.trim_end_matches('/'))
}

/// Request body for one batchGet call.
pub fn batch_body(window: &DateWindow, requests: &[PageRequest<'_>]) -> Value {
    let start = window.start.format("%Y-%m-%d").to_string();
    let end = window.end.format("%Y-%m-%d").to_string();

    let reports: Vec<Value> = requests
        .iter()
        .map(|req| {
            let q = req.query;
            let mut report = json!({
                "viewId": q.view_id,
                "dateRanges": [{"startDate": start, "endDate": end}],
                "metrics": q.metrics.iter().map(|m| json!({"expression": m})).collect::<Vec<_>>(),
                "dimensions": q.dimensions.iter().map(|d| json!({"name": d})).collect::<Vec<_>>(),
                "pageSize": q.page_size,
            });
            if !q.filters.is_empty() {
                let filters: Vec<Value> = q
                    .filters
                    .iter()
                    .map(|f| {
                        json!({
                            "dimensionName": f.dimension,
                            "operator": f.operator,
                            "not": f.not,
                            "expressions": f.expressions,
                        })
                    })
                    .collect();
                report["dimensionFilterClauses"] = json!([{ "filters": filters }]);
            }
            if let Some(token) = req.cursor {
                report["pageToken"] = json!(token);
            }
            report
        })
        .collect();

    json!({ "reportRequests": reports })
}

/// Extract `error.message` from a Google API error body, else quote the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            match trimmed.char_indices().nth(MAX_ERROR_BODY) {
                Some((idx, _)) => format!("{}...", &trimmed[..idx]),
                None => trimmed.to_string(),
            }
        })
}
