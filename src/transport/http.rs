//! HTTP transport for the ingestion service
//!
//! Submit is `POST {base}/send` with an optional `session_id` header.
//! Confirmation is `GET {base}/session/{id}/event/{index}`; only `200` counts
//! as confirmed. Every call is bounded by the configured request timeout.

use crate::domain::event::{ConfirmationBody, SessionIdBody};
use crate::domain::{BaseUrl, Confirmation, EventIndex, EventRecord, ServerSessionId};
use crate::transport::{ConfirmReply, Transport, TransportError};
use ::http::header::CONTENT_TYPE;
use ::http::{Method, Request, StatusCode};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Header that tags a submission with its session
pub const SESSION_ID_HEADER: &str = "session_id";

/// Content type sent with every submission
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Default per-call deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub mod paths {
    pub const SEND: &str = "/send";
    pub const SESSION: &str = "/session";
    pub const EVENT: &str = "event";
}

/// Transport backed by a pooled hyper client
///
/// The orchestrator builds one per session, so connection state is never
/// shared between sessions. The client itself is safe for the concurrent
/// confirmation polls of that session.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: BaseUrl,
    request_timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new(base_url: BaseUrl, request_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            base_url,
            request_timeout,
            client,
        }
    }

    fn send_uri(&self) -> String {
        format!("{}{}", self.base_url, paths::SEND)
    }

    fn confirm_uri(&self, session: &ServerSessionId, index: EventIndex) -> String {
        format!(
            "{}{}/{}/{}/{}",
            self.base_url,
            paths::SESSION,
            urlencoding::encode(session.as_ref()),
            paths::EVENT,
            index
        )
    }

    /// Perform one round trip and collect the whole response body
    async fn execute(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(StatusCode, Bytes), TransportError> {
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Connection(format!("Body collection error: {e}")))?
                .to_bytes();
            Ok::<_, TransportError>((parts.status, body))
        };

        tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))?
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(
        &self,
        event: &EventRecord,
        session: Option<&ServerSessionId>,
    ) -> Result<Option<ServerSessionId>, TransportError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| TransportError::Encoding(e.to_string()))?;

        let uri = self.send_uri();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(session) = session {
            builder = builder.header(SESSION_ID_HEADER, session.as_ref());
        }
        let request = builder
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: uri,
            });
        }
        if body.is_empty() {
            return Ok(None);
        }

        let assigned: SessionIdBody =
            serde_json::from_slice(&body).map_err(|e| TransportError::Encoding(e.to_string()))?;
        Ok(ServerSessionId::try_new(assigned.session_id).ok())
    }

    async fn confirm(
        &self,
        session: &ServerSessionId,
        index: EventIndex,
    ) -> Result<ConfirmReply, TransportError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.confirm_uri(session, index))
            .body(Full::new(Bytes::new()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let (status, body) = self.execute(request).await?;
        if status != StatusCode::OK {
            debug!(%session, %index, status = status.as_u16(), "Event not yet confirmed");
            return Ok(ConfirmReply::NotConfirmed {
                status: status.as_u16(),
            });
        }

        let confirmed: ConfirmationBody =
            serde_json::from_slice(&body).map_err(|e| TransportError::Encoding(e.to_string()))?;
        Ok(ConfirmReply::Confirmed(Confirmation {
            recorded_at: confirmed.timestamp,
            echoed: confirmed.sstr,
        }))
    }
}
