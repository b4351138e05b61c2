//! JSON over HTTP plumbing shared by every service: the outgoing
//! [`HttpTransport`] and the [`reply`] helper used by axum handlers.
use std::time::Duration;

use axum::{Json, http::StatusCode};
use proto::{DfsError, Reply};
use serde::{Serialize, de::DeserializeOwned};
use tracing::trace;

/// Wraps a handler result into the reply envelope with a matching status code.
pub fn reply<T: Serialize>(result: Result<T, DfsError>) -> (StatusCode, Json<Reply<T>>) {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    };
    (status, Json(result.into()))
}

/// Outgoing calls to coordinator or storage nodes. Every request carries the
/// configured timeout; transport failures surface as `NodeUnreachable`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn post<Req, Resp>(&self, addrs: &str, endpoint: &str, body: &Req) -> Result<Resp, DfsError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{addrs}{endpoint}");
        trace!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await;
        decode(&url, response).await
    }

    pub async fn get<Resp>(&self, addrs: &str, endpoint: &str) -> Result<Resp, DfsError>
    where
        Resp: DeserializeOwned,
    {
        let url = format!("{addrs}{endpoint}");
        trace!(%url, "GET");
        let response = self.client.get(&url).timeout(self.timeout).send().await;
        decode(&url, response).await
    }
}

async fn decode<Resp: DeserializeOwned>(
    url: &str,
    response: reqwest::Result<reqwest::Response>,
) -> Result<Resp, DfsError> {
    let response = response.map_err(|e| DfsError::unreachable(format!("{url}: {e}")))?;
    let status = response.status();
    let reply: Reply<Resp> = response.json().await.map_err(|e| {
        if e.is_timeout() {
            DfsError::unreachable(format!("{url}: {e}"))
        } else {
            DfsError::protocol(format!("{url} answered {status} with an unreadable body: {e}"))
        }
    })?;
    reply.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_replies_carry_their_status() {
        let (status, Json(body)) = reply::<()>(Err(DfsError::not_found("/missing.txt")));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, Reply::Err(DfsError::not_found("/missing.txt")));

        let (status, _) = reply::<()>(Err(DfsError::already_exists("/a.txt")));
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = reply(Ok(7u64));
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn refused_connections_are_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addrs = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let transport = HttpTransport::new(Duration::from_millis(500));
        let result: Result<(), DfsError> = transport.get(&addrs, "/status").await;
        assert!(matches!(result, Err(DfsError::NodeUnreachable { .. })));
    }
}
