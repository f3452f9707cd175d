pub mod dispatcher;
pub mod response;

pub use dispatcher::{DispatchRequest, Dispatcher, KNOWN_RESOURCE_SAMPLE};
pub use response::{normalize, DispatchOutcome};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use reqwest::header::HeaderMap;

    use crate::client::{HttpTransport, OutboundRequest, TransportResponse};
    use crate::utils::{GatewayError, Result as GatewayResult};

    pub const BASE_URL: &str = "https://api.example.com";

    enum Reply {
        Status(u16, String),
        Failure(String),
    }

    /// Records every request and answers each with the same canned reply.
    pub struct MockTransport {
        base_url: Option<String>,
        reply: Reply,
        requests: Mutex<Vec<OutboundRequest>>,
    }

    impl MockTransport {
        pub fn returning(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                base_url: Some(BASE_URL.to_string()),
                reply: Reply::Status(status, body.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                base_url: Some(BASE_URL.to_string()),
                reply: Reply::Failure(message.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn without_base_url(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                base_url: None,
                reply: Reply::Status(status, body.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<OutboundRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        fn base_url(&self) -> Option<&str> {
            self.base_url.as_deref()
        }

        async fn request(&self, request: OutboundRequest) -> GatewayResult<TransportResponse> {
            self.requests.lock().push(request);
            match &self.reply {
                Reply::Status(status, body) => Ok(TransportResponse {
                    status: *status,
                    headers: HeaderMap::new(),
                    body: Bytes::from(body.clone()),
                }),
                Reply::Failure(message) => Err(GatewayError::Request(message.clone())),
            }
        }
    }
}
