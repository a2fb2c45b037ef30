// asset-gateway/src/middleware/access_log.rs
use std::time::Instant;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderMap},
    Error,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use uuid::Uuid;

// Proxy headers checked for the client address, most specific first
const CLIENT_IP_HEADERS: [&str; 3] = ["CF-Connecting-IP", "X-Forwarded-For", "X-Real-IP"];

/// One structured log event per request
#[derive(Debug, Clone, Default)]
pub struct AccessLog;

impl AccessLog {
    pub fn new() -> Self {
        Self
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<&str>) -> String {
    for name in CLIENT_IP_HEADERS {
        let value = header_str(headers, name);
        // X-Forwarded-For may be a list; the first hop is the client
        if let Some(first) = value.split(',').map(str::trim).find(|v| !v.is_empty()) {
            return first.to_string();
        }
    }
    peer.unwrap_or("unknown").to_string()
}

impl<S, B> Transform<S, ServiceRequest> for AccessLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AccessLogMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessLogMiddleware { service }))
    }
}

pub struct AccessLogMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AccessLogMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let headers = req.headers();
        let user_agent = header_str(headers, header::USER_AGENT.as_str()).to_string();
        let referer = header_str(headers, header::REFERER.as_str()).to_string();
        let ip = client_ip(headers, req.connection_info().peer_addr());

        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(res) => tracing::info!(
                    %request_id,
                    %method,
                    %path,
                    status = res.status().as_u16(),
                    %user_agent,
                    %referer,
                    %ip,
                    elapsed_ms,
                    "request"
                ),
                Err(e) => tracing::warn!(
                    %request_id,
                    %method,
                    %path,
                    status = e.as_response_error().status_code().as_u16(),
                    %ip,
                    elapsed_ms,
                    "request failed"
                ),
            }

            result
        })
    }
}
