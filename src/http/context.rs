//! Request metadata visible to the allow gate and the renderer.

use axum::http::{HeaderMap, Method, Request, Uri};
use uuid::Uuid;

/// Snapshot of the request a trace belongs to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            uri,
            headers: HeaderMap::new(),
        }
    }

    /// Capture method, URI and headers from an incoming request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Identifier used to correlate log lines for this request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
