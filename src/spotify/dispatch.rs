use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    spotify::auth::AuthSession,
};

/// A bearer-authenticated Web API call, rebuilt for every attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Body is decoded.
    Success,
    /// Nothing to return, and nothing went wrong.
    NoContent,
    /// Access token rejected; refresh and retry once.
    Unauthorized,
    /// Logged and dropped.
    Failure(StatusCode),
}

impl ResponseClass {
    pub fn classify(status: StatusCode) -> Self {
        match status {
            StatusCode::NO_CONTENT => ResponseClass::NoContent,
            StatusCode::UNAUTHORIZED => ResponseClass::Unauthorized,
            s if s.is_success() => ResponseClass::Success,
            s => ResponseClass::Failure(s),
        }
    }
}

/// Sends authenticated requests, refreshing the token on a 401 and retrying
/// exactly once.
pub struct RequestDispatcher {
    session: Arc<AuthSession>,
    client: Client,
    base_url: String,
}

impl RequestDispatcher {
    pub fn new(session: Arc<AuthSession>, client: Client) -> Self {
        let base_url = session.api_url().trim_end_matches('/').to_string();
        Self {
            session,
            client,
            base_url,
        }
    }

    /// Runs `request` and decodes the body as `T`.
    ///
    /// Every failure is soft: it is logged and reported as `None`, the same
    /// as a `204 No Content`.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Option<T> {
        match self.try_execute(request).await {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %request.path, error = %e, "request failed");
                None
            }
        }
    }

    /// Like [`execute`](Self::execute) but keeps network and decode errors
    /// distinct from "no content".
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] when the request could not be sent
    /// - [`Error::Decode`] when a success body does not match `T`; this is
    ///   never retried
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn try_execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<Option<T>> {
        let token = match self.session.access_token() {
            Some(token) => token,
            None => {
                debug!("no access token in memory, refreshing first");
                if !self.session.refresh_token().await {
                    return Ok(None);
                }
                match self.session.access_token() {
                    Some(token) => token,
                    None => return Ok(None),
                }
            }
        };

        let response = self.send(request, &token).await?;
        match ResponseClass::classify(response.status()) {
            ResponseClass::Success => decode(response).await.map(Some),
            ResponseClass::NoContent => Ok(None),
            ResponseClass::Unauthorized => {
                debug!("access token rejected, refreshing");
                if !self.session.refresh_after_rejection(&token).await {
                    return Ok(None);
                }
                let Some(token) = self.session.access_token() else {
                    return Ok(None);
                };

                let retry = self.send(request, &token).await?;
                match ResponseClass::classify(retry.status()) {
                    ResponseClass::Success => decode(retry).await.map(Some),
                    ResponseClass::NoContent => Ok(None),
                    _ => {
                        warn!(status = %retry.status(), "request failed after token refresh");
                        Ok(None)
                    }
                }
            }
            ResponseClass::Failure(status) => {
                warn!(%status, "request returned an error status");
                Ok(None)
            }
        }
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let response = self
            .client
            .request(request.method.clone(), &url)
            .query(&request.query)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_statuses() {
        assert_eq!(ResponseClass::classify(StatusCode::OK), ResponseClass::Success);
        assert_eq!(ResponseClass::classify(StatusCode::CREATED), ResponseClass::Success);
        assert_eq!(
            ResponseClass::classify(StatusCode::NO_CONTENT),
            ResponseClass::NoContent
        );
        assert_eq!(
            ResponseClass::classify(StatusCode::UNAUTHORIZED),
            ResponseClass::Unauthorized
        );
        assert_eq!(
            ResponseClass::classify(StatusCode::FORBIDDEN),
            ResponseClass::Failure(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            ResponseClass::classify(StatusCode::TOO_MANY_REQUESTS),
            ResponseClass::Failure(StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[test]
    fn api_request_collects_query() {
        let req = ApiRequest::get("/search").query("q", "nina simone").query("limit", 20);
        assert_eq!(req.method, Method::GET);
        assert_eq!(
            req.query,
            vec![
                ("q".to_string(), "nina simone".to_string()),
                ("limit".to_string(), "20".to_string())
            ]
        );
    }
}
