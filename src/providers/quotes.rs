//! Market-quote provider for exchange-traded indicators (VIX, S&P 500).
//!
//! Quotes move intraday, so this provider keeps its own one-hour cache,
//! longer than the indicator cache but shorter than the fallback tier.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::cache::TimedCache;
use crate::core::correlation::normalize_series;
use crate::core::error::ProviderError;
use crate::core::health::{HealthState, ProviderProbe};
use crate::core::indicator::{
    IndicatorProvider, IndicatorSource, IndicatorSpec, MetricDataPoint, MetricValue,
};

pub const SOURCE_NAME: &str = "Yahoo Finance";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_TTL: Duration = Duration::from_secs(60 * 60);

/// A liquid, always-available symbol for health probes.
const PROBE_SYMBOL: &str = "^GSPC";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Debug, Deserialize)]
struct ChartItem {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    #[serde(alias = "chartPreviousClose")]
    previous_close: Option<f64>,
    #[serde(alias = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

pub struct QuoteClient {
    base_url: String,
    client: reqwest::Client,
    cache: TimedCache<String, MetricValue>,
}

impl QuoteClient {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("macrolens/1.0")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache: TimedCache::new(QUOTE_TTL),
        })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str) -> Result<ChartItem, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range={}",
            self.base_url, symbol, range
        );
        debug!("Requesting quote data from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        seconds: DEFAULT_TIMEOUT.as_secs(),
                    }
                } else {
                    ProviderError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let data = response
            .json::<ChartResponse>()
            .await
            .map_err(|e| ProviderError::Unusable(format!("malformed response: {e}")))?;
        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| ProviderError::Unusable(format!("no chart data for {symbol}")))
    }
}

fn quote_date(item: &ChartItem) -> String {
    let epoch_seconds = item
        .meta
        .regular_market_time
        .or_else(|| item.timestamp.as_ref().and_then(|ts| ts.last().copied()));
    match epoch_seconds.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)) {
        Some(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        None => Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    }
}

#[async_trait]
impl IndicatorProvider for QuoteClient {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(name = "QuoteFetch", skip(self, spec), fields(indicator = %spec.name))]
    async fn fetch_indicator(&self, spec: &IndicatorSpec) -> Result<MetricValue, ProviderError> {
        let IndicatorSource::MarketQuote { symbol } = &spec.source else {
            return Err(ProviderError::Unusable(format!(
                "{} is not a market-quote indicator",
                spec.name
            )));
        };

        if let Some(cached) = self.cache.get(&spec.name).await {
            return Ok(cached);
        }

        let item = self.fetch_chart(symbol, "5d").await?;
        let price = item.meta.regular_market_price;
        let change = item
            .meta
            .previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| price - prev);

        let result = MetricValue {
            value: Some(price),
            formatted: spec.unit.format(price),
            date: quote_date(&item),
            change,
            source: SOURCE_NAME.to_string(),
            is_fallback: false,
            error: None,
        };

        self.cache.put(spec.name.clone(), result.clone()).await;
        Ok(result)
    }

    async fn fetch_history(
        &self,
        spec: &IndicatorSpec,
        since: Option<NaiveDate>,
        limit: u32,
    ) -> Result<Vec<MetricDataPoint>, ProviderError> {
        let IndicatorSource::MarketQuote { symbol } = &spec.source else {
            return Err(ProviderError::Unusable(format!(
                "{} is not a market-quote indicator",
                spec.name
            )));
        };

        let item = self.fetch_chart(symbol, "1y").await?;
        let (Some(timestamps), Some(closes)) = (
            item.timestamp.as_ref(),
            item.indicators
                .as_ref()
                .and_then(|inds| inds.quote.first())
                .and_then(|q| q.close.as_ref()),
        ) else {
            return Err(ProviderError::Unusable(format!(
                "no historical bars for {symbol}"
            )));
        };

        let since_ms = since
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis());

        let points: Vec<MetricDataPoint> = timestamps
            .iter()
            .zip(closes.iter())
            .filter_map(|(ts, close)| {
                let value = (*close)?;
                let timestamp_ms = ts * 1000;
                if since_ms.is_some_and(|s| timestamp_ms < s) {
                    return None;
                }
                Some(MetricDataPoint {
                    timestamp_ms,
                    value,
                })
            })
            .take(limit as usize)
            .collect();

        Ok(normalize_series(&points))
    }
}

#[async_trait]
impl ProviderProbe for QuoteClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn probe(&self) -> Result<HealthState, ProviderError> {
        match self.fetch_chart(PROBE_SYMBOL, "1d").await {
            Ok(_) => Ok(HealthState::Healthy),
            Err(e) if e.is_rate_limited() => Ok(HealthState::Degraded),
            Err(e @ ProviderError::Unusable(_)) => {
                // Parseable but missing the expected payload.
                tracing::debug!(error = %e, "Probe payload malformed");
                Ok(HealthState::Degraded)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::freshness::Frequency;
    use crate::core::indicator::Unit;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vix_spec() -> IndicatorSpec {
        IndicatorSpec {
            name: "vix".to_string(),
            display_name: "CBOE Volatility Index".to_string(),
            source: IndicatorSource::MarketQuote {
                symbol: "^VIX".to_string(),
            },
            frequency: Frequency::Daily,
            market_dependent: true,
            unit: Unit::Index,
        }
    }

    async fn mount_chart(server: &MockServer, symbol: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let server = MockServer::start().await;
        mount_chart(
            &server,
            "^VIX",
            r#"{"chart": {"result": [{
                "meta": {
                    "regularMarketPrice": 17.3,
                    "chartPreviousClose": 16.8,
                    "regularMarketTime": 1755891000
                }
            }]}}"#,
        )
        .await;

        let client = QuoteClient::new(&server.uri()).unwrap();
        let result = client.fetch_indicator(&vix_spec()).await.unwrap();

        assert_eq!(result.value, Some(17.3));
        assert_eq!(result.formatted, "17.3");
        assert!((result.change.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(result.source, "Yahoo Finance");
        assert!(!result.is_fallback);
    }

    #[tokio::test]
    async fn test_empty_chart_is_unusable() {
        let server = MockServer::start().await;
        mount_chart(&server, "^VIX", r#"{"chart": {"result": []}}"#).await;

        let client = QuoteClient::new(&server.uri()).unwrap();
        let err = client.fetch_indicator(&vix_spec()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unusable(_)));
    }

    #[tokio::test]
    async fn test_history_drops_null_closes() {
        let server = MockServer::start().await;
        mount_chart(
            &server,
            "^VIX",
            r#"{"chart": {"result": [{
                "meta": {"regularMarketPrice": 17.3},
                "timestamp": [1755500000, 1755600000, 1755700000],
                "indicators": {"quote": [{"close": [16.1, null, 17.3]}]}
            }]}}"#,
        )
        .await;

        let client = QuoteClient::new(&server.uri()).unwrap();
        let points = client.fetch_history(&vix_spec(), None, 100).await.unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 16.1);
        assert_eq!(points[1].value, 17.3);
        assert!(points[0].timestamp_ms < points[1].timestamp_ms);
    }

    #[tokio::test]
    async fn test_probe_degraded_on_malformed_payload() {
        let server = MockServer::start().await;
        mount_chart(&server, "^GSPC", r#"{"chart": {"result": null}}"#).await;

        let client = QuoteClient::new(&server.uri()).unwrap();
        assert_eq!(client.probe().await.unwrap(), HealthState::Degraded);
    }

    #[tokio::test]
    async fn test_probe_down_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/^GSPC"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = QuoteClient::new(&server.uri()).unwrap();
        assert!(client.probe().await.is_err());
    }
}
