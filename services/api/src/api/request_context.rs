//! Request-scoped context extracted from HTTP requests.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tutorhub_id::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| RequestId::new().to_string());

        Ok(Self { request_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, _) = request.into_parts();
        RequestContext::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_is_taken_from_header() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "req-from-proxy")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.request_id, "req-from-proxy");
    }

    #[tokio::test]
    async fn test_request_id_is_generated_when_missing() {
        let request = Request::builder().body(()).unwrap();
        let ctx = extract(request).await;
        assert!(ctx.request_id.starts_with("req_"));
    }
}
