use crate::domain::repositories::accrual_oracle::{
    AccrualOracle, OracleError, OracleReport, OracleResult, OracleStatus,
};
use crate::domain::value_objects::order_number::OrderNumber;
use crate::domain::value_objects::points::Points;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Used when a 429 arrives without a usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Accrual system response body
#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: String,
    #[serde(default)]
    accrual: Option<serde_json::Number>,
}

/// HTTP client for the accrual system
pub struct HttpAccrualClient {
    client: Client,
    base_url: Url,
}

impl HttpAccrualClient {
    /// # Arguments
    /// * `base_url` - Accrual system root, e.g. `http://localhost:8081`
    /// * `request_timeout` - Upper bound for a single status request
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, String> {
        let base_url =
            Url::parse(base_url).map_err(|e| format!("Invalid accrual address '{}': {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("Accrual address '{}' cannot be a base URL", base_url));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, base_url })
    }

    fn status_url(&self, number: &OrderNumber) -> OracleResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OracleError::Network(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "orders", number.as_str()]);
        Ok(url)
    }
}

fn retry_after(response: &reqwest::Response) -> Duration {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Turn a decoded body into an internal report
fn into_report(number: &OrderNumber, body: AccrualResponse) -> OracleResult<OracleReport> {
    if body.order != number.as_str() {
        return Err(OracleError::Malformed(format!(
            "asked for order {}, got {}",
            number, body.order
        )));
    }

    let status = OracleStatus::from_str(&body.status)?;
    let accrual = match body.accrual {
        None => Points::ZERO,
        Some(raw) => {
            let decimal = BigDecimal::from_str(&raw.to_string())
                .map_err(|e| OracleError::Malformed(format!("accrual {}: {}", raw, e)))?;
            Points::from_decimal(&decimal)
                .map_err(|e| OracleError::Malformed(format!("accrual {}", e)))?
        }
    };

    Ok(OracleReport { status, accrual })
}

#[async_trait]
impl AccrualOracle for HttpAccrualClient {
    async fn fetch_status(&self, number: &OrderNumber) -> OracleResult<OracleReport> {
        let url = self.status_url(number)?;
        debug!("Fetching accrual status: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Network(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => {
                let body: AccrualResponse = response
                    .json()
                    .await
                    .map_err(|e| OracleError::Malformed(e.to_string()))?;
                into_report(number, body)
            }
            StatusCode::NO_CONTENT => Err(OracleError::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = retry_after(&response);
                warn!("Accrual system rate limited us for {:?}", retry_after);
                Err(OracleError::RateLimited { retry_after })
            }
            other => Err(OracleError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number() -> OrderNumber {
        OrderNumber::parse("79927398713").unwrap()
    }

    fn body(status: &str, accrual: Option<&str>) -> AccrualResponse {
        AccrualResponse {
            order: "79927398713".to_string(),
            status: status.to_string(),
            accrual: accrual.map(|a| serde_json::from_str(a).unwrap()),
        }
    }

    #[test]
    fn test_status_url_joins_path() {
        let client = HttpAccrualClient::new("http://localhost:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.status_url(&number()).unwrap().as_str(),
            "http://localhost:8081/api/orders/79927398713"
        );
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(HttpAccrualClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpAccrualClient::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_into_report_converts_decimal_accrual() {
        let report = into_report(&number(), body("PROCESSED", Some("729.98"))).unwrap();
        assert_eq!(report.status, OracleStatus::Processed);
        assert_eq!(report.accrual.minor(), 72998);

        let report = into_report(&number(), body("REGISTERED", None)).unwrap();
        assert_eq!(report.accrual, Points::ZERO);
    }

    #[test]
    fn test_into_report_rejects_bad_bodies() {
        assert!(matches!(
            into_report(&number(), body("DONE", None)),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            into_report(&number(), body("PROCESSED", Some("-5"))),
            Err(OracleError::Malformed(_))
        ));

        let mut mismatched = body("PROCESSED", Some("1"));
        mismatched.order = "12345674".to_string();
        assert!(matches!(
            into_report(&number(), mismatched),
            Err(OracleError::Malformed(_))
        ));
    }
}
