use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::indicator::{IndicatorProvider, IndicatorSnapshot};

/// Client for the MLA market-information statistics API.
pub struct MlaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl MlaProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("saleyard/0.2")
            .timeout(timeout)
            .build()?;
        Ok(MlaProvider {
            base_url: base_url.to_string(),
            client,
        })
    }
}

#[derive(Deserialize, Debug)]
struct MlaReportResponse {
    report: Report,
}

#[derive(Deserialize, Debug)]
struct Report {
    indicators: Vec<IndicatorItem>,
}

#[derive(Deserialize, Debug)]
struct IndicatorItem {
    code: String,
    value: f64,
    unit: String,
    #[serde(alias = "asOf")]
    as_of: NaiveDate,
}

#[async_trait]
impl IndicatorProvider for MlaProvider {
    #[instrument(
        name = "MlaIndicatorFetch",
        skip(self),
        fields(code = %code)
    )]
    async fn fetch_indicator(&self, code: &str) -> Result<IndicatorSnapshot> {
        let url = format!("{}/v1/indicators/{}", self.base_url, code);
        debug!("Requesting indicator data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for indicator: {} URL: {}", e, code, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for indicator: {}",
                response.status(),
                code
            ));
        }

        let text = response.text().await?;
        let data: MlaReportResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", code, e))?;

        let item = data
            .report
            .indicators
            .into_iter()
            .find(|item| item.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| anyhow!("No indicator data found for code: {}", code))?;

        Ok(IndicatorSnapshot {
            code: item.code,
            value: item.value,
            unit: item.unit,
            as_of: item.as_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(code: &str, mock_response: &str) -> wiremock::MockServer {
        let mock_server = wiremock::MockServer::start().await;
        let request_path = format!("/v1/indicators/{code}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(base_url: &str) -> MlaProvider {
        MlaProvider::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_indicator_fetch() {
        let mock_response = r#"{
            "report": {
                "indicators": [{
                    "code": "EYCI",
                    "value": 410.25,
                    "unit": "c/kg cwt",
                    "asOf": "2024-05-01"
                }]
            }
        }"#;

        let mock_server = create_mock_server("EYCI", mock_response).await;
        let result = provider(&mock_server.uri())
            .fetch_indicator("EYCI")
            .await
            .unwrap();

        assert_eq!(result.code, "EYCI");
        assert_eq!(result.value, 410.25);
        assert_eq!(result.unit, "c/kg cwt");
        assert_eq!(result.as_of, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[tokio::test]
    async fn test_no_indicator_data() {
        let mock_response = r#"{"report": {"indicators": []}}"#;
        let mock_server = create_mock_server("EYCI", mock_response).await;

        let result = provider(&mock_server.uri()).fetch_indicator("EYCI").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No indicator data found for code: EYCI"
        );
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/indicators/EYCI"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server.uri()).fetch_indicator("EYCI").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for indicator: EYCI"
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        // "results" instead of "indicators"
        let mock_response = r#"{"report": {"results": []}}"#;
        let mock_server = create_mock_server("EYCI", mock_response).await;

        let result = provider(&mock_server.uri()).fetch_indicator("EYCI").await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for EYCI")
        );
    }

    #[tokio::test]
    async fn test_code_mismatch_is_not_matched() {
        let mock_response = r#"{
            "report": {
                "indicators": [{
                    "code": "WYCI",
                    "value": 395.0,
                    "unit": "c/kg cwt",
                    "asOf": "2024-05-01"
                }]
            }
        }"#;
        let mock_server = create_mock_server("EYCI", mock_response).await;

        let result = provider(&mock_server.uri()).fetch_indicator("EYCI").await;
        assert!(result.is_err());
    }
}
