/// HTTP access to the dashboard JSON API
///
/// [`FeedSource`] is the seam between the dashboard state machine and the network: the
/// production [`HttpFeedSource`] issues one GET per call, tests substitute a stub.
use crate::shared::{
    config::DashboardConfig,
    error::{ClientError, FeedError},
    types::{
        Feed, HealthResponse, IndicatorSet, IndicatorsResponse, PerformanceResponse,
        RiskResponse, SignalsResponse, StatusResponse, TradesResponse, TradingMode,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Source of every dashboard feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn status(&self) -> Result<StatusResponse, FeedError>;

    /// Indicator values, with nested and flat payload shapes already merged
    async fn indicators(&self) -> Result<IndicatorSet, FeedError>;

    async fn performance(&self) -> Result<PerformanceResponse, FeedError>;

    async fn risk(&self) -> Result<RiskResponse, FeedError>;

    /// Most recent `limit` closed trades, optionally filtered server-side by mode
    async fn trades(
        &self,
        mode: Option<TradingMode>,
        limit: usize,
    ) -> Result<TradesResponse, FeedError>;

    /// Up to `limit` signals from the last `hours`
    async fn signals(&self, limit: usize, hours: u32) -> Result<SignalsResponse, FeedError>;

    /// Liveness probe. Errors are attributed to [`Feed::Status`].
    async fn health(&self) -> Result<HealthResponse, FeedError>;
}

/// [`FeedSource`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpFeedSource {
    pub fn new(config: &DashboardConfig) -> Result<Self, ClientError> {
        let base = config.base().map_err(|error| ClientError::BaseUrl {
            url: config.base_url.clone(),
            reason: error.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| ClientError::Http(error.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for `path` with `query` appended
    fn endpoint(&self, feed: Feed, path: &str, query: &[(&str, String)]) -> Result<Url, FeedError> {
        let mut url = self.base.join(path).map_err(|error| FeedError::Url {
            feed,
            reason: error.to_string(),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T>(&self, feed: Feed, url: Url) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
    {
        debug!(%feed, %url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| FeedError::from_reqwest(feed, error))?;

        let body = response
            .text()
            .await
            .map_err(|error| FeedError::from_reqwest(feed, error))?;

        serde_json::from_str(&body).map_err(|error| FeedError::Decode {
            feed,
            reason: error.to_string(),
        })
    }

    async fn get_feed<T>(&self, feed: Feed, query: &[(&str, String)]) -> Result<T, FeedError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(feed, feed.path(), query)?;
        self.get_json(feed, url).await
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn status(&self) -> Result<StatusResponse, FeedError> {
        self.get_feed(Feed::Status, &[]).await
    }

    async fn indicators(&self) -> Result<IndicatorSet, FeedError> {
        self.get_feed::<IndicatorsResponse>(Feed::Indicators, &[])
            .await
            .map(IndicatorsResponse::into_set)
    }

    async fn performance(&self) -> Result<PerformanceResponse, FeedError> {
        self.get_feed(Feed::Performance, &[]).await
    }

    async fn risk(&self) -> Result<RiskResponse, FeedError> {
        self.get_feed(Feed::Risk, &[]).await
    }

    async fn trades(
        &self,
        mode: Option<TradingMode>,
        limit: usize,
    ) -> Result<TradesResponse, FeedError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(mode) = mode {
            query.push(("mode", mode.as_str().to_string()));
        }
        self.get_feed(Feed::Trades, &query).await
    }

    async fn signals(&self, limit: usize, hours: u32) -> Result<SignalsResponse, FeedError> {
        let query = [("limit", limit.to_string()), ("hours", hours.to_string())];
        self.get_feed(Feed::Signals, &query).await
    }

    async fn health(&self) -> Result<HealthResponse, FeedError> {
        let url = self.endpoint(Feed::Status, "health", &[])?;
        self.get_json(Feed::Status, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve one canned HTTP response, returning the base URL and the request line received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

        (format!("http://{addr}/"), handle)
    }

    fn source(base: &str) -> HttpFeedSource {
        let config = DashboardConfig::new(base).with_request_timeout(Duration::from_secs(5));
        HttpFeedSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_status_request_and_decode() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"bot_status":{"running":true,"mode":"paper"},"account":{"balance":1012.5,"total_pnl":12.5},"positions_count":1,"btc_price":67012.5,"positions":[]}"#,
        )
        .await;

        let status = source(&base).status().await.unwrap();
        assert!(status.bot_status.running);
        assert_eq!(status.account.balance, Some(1012.5));
        assert_eq!(status.positions_count, Some(1));
        assert_eq!(server.await.unwrap(), "GET /api/status HTTP/1.1");
    }

    #[tokio::test]
    async fn test_trades_query_carries_limit_and_mode() {
        let (base, server) = serve_once("200 OK", r#"{"trades":[]}"#).await;
        let trades = source(&base).trades(Some(TradingMode::Live), 10).await.unwrap();
        assert!(trades.trades.is_empty());
        assert_eq!(server.await.unwrap(), "GET /api/trades?limit=10&mode=live HTTP/1.1");

        let (base, server) = serve_once("200 OK", r#"{"trades":[]}"#).await;
        source(&base).trades(None, 10).await.unwrap();
        assert_eq!(server.await.unwrap(), "GET /api/trades?limit=10 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_signals_query_carries_limit_and_hours() {
        let (base, server) = serve_once("200 OK", r#"{"signals":[]}"#).await;
        source(&base).signals(50, 24).await.unwrap();
        assert_eq!(server.await.unwrap(), "GET /api/signals?limit=50&hours=24 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_non_success_status_is_feed_error() {
        let (base, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let error = source(&base).risk().await.unwrap_err();
        assert_eq!(error, FeedError::Status { feed: Feed::Risk, status: 500 });
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let (base, _server) = serve_once("200 OK", "<html>not json</html>").await;
        let error = source(&base).performance().await.unwrap_err();
        assert!(matches!(error, FeedError::Decode { feed: Feed::Performance, .. }));
        assert!(error.is_payload());
    }

    #[tokio::test]
    async fn test_nested_indicators_are_merged() {
        let (base, _server) = serve_once(
            "200 OK",
            r#"{"indicators":{"rsi":61.2,"ema_micro":100.5},"rsi":10,"market_regime":"trending"}"#,
        )
        .await;
        let set = source(&base).indicators().await.unwrap();
        assert_eq!(set.rsi, Some(61.2));
        assert_eq!(set.ema_micro, Some(100.5));
        assert_eq!(set.market_regime.as_deref(), Some("trending"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = source(&format!("http://{addr}/")).status().await.unwrap_err();
        assert_eq!(error.feed(), Feed::Status);
        assert!(!error.is_payload());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let error = HttpFeedSource::new(&DashboardConfig::new("::nope::")).unwrap_err();
        assert!(matches!(error, ClientError::BaseUrl { .. }));
    }
}
