use crate::shared::types::Feed;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated while polling the dashboard API.
///
/// Every variant is tagged with the [`Feed`] that produced it so a failed cycle can be
/// attributed in logs and in the per-feed health shown on screen.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("{feed}: invalid request url: {reason}")]
    Url { feed: Feed, reason: String },

    #[error("{feed}: transport failure: {reason}")]
    Transport { feed: Feed, reason: String },

    #[error("{feed}: request timed out")]
    Timeout { feed: Feed },

    #[error("{feed}: server responded with HTTP {status}")]
    Status { feed: Feed, status: u16 },

    #[error("{feed}: malformed JSON body: {reason}")]
    Decode { feed: Feed, reason: String },
}

/// Errors building the HTTP feed source at startup.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ClientError {
    #[error("invalid base url {url}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

impl FeedError {
    /// Build a [`FeedError`] from a `reqwest` failure, keeping timeouts and status codes apart.
    pub fn from_reqwest(feed: Feed, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FeedError::Timeout { feed }
        } else if let Some(status) = error.status() {
            FeedError::Status {
                feed,
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            FeedError::Decode {
                feed,
                reason: error.to_string(),
            }
        } else {
            FeedError::Transport {
                feed,
                reason: error.to_string(),
            }
        }
    }

    /// Feed that produced this error.
    pub fn feed(&self) -> Feed {
        match self {
            FeedError::Url { feed, .. }
            | FeedError::Transport { feed, .. }
            | FeedError::Timeout { feed }
            | FeedError::Status { feed, .. }
            | FeedError::Decode { feed, .. } => *feed,
        }
    }

    /// Determine if the error came from the body rather than the network.
    ///
    /// Body errors repeat on every poll until the server changes, network errors usually clear
    /// on the next tick.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_payload(&self) -> bool {
        match self {
            FeedError::Decode { .. } => true,
            FeedError::Status { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_payload() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: malformed body is a payload error
                input: FeedError::Decode {
                    feed: Feed::Risk,
                    reason: "expected value at line 1 column 1".to_string(),
                },
                expected: true,
            },
            TestCase {
                // TC1: 404 is a payload error
                input: FeedError::Status {
                    feed: Feed::Trades,
                    status: 404,
                },
                expected: true,
            },
            TestCase {
                // TC2: 502 clears on a later tick
                input: FeedError::Status {
                    feed: Feed::Status,
                    status: 502,
                },
                expected: false,
            },
            TestCase {
                // TC3: connection refused
                input: FeedError::Transport {
                    feed: Feed::Indicators,
                    reason: "connection refused".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC4: timeout
                input: FeedError::Timeout {
                    feed: Feed::Signals,
                },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_payload();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_feed_error_display_names_feed() {
        let err = FeedError::Status {
            feed: Feed::Performance,
            status: 500,
        };
        assert_eq!(err.to_string(), "performance: server responded with HTTP 500");
        assert_eq!(err.feed(), Feed::Performance);
    }
}
