/// Security headers middleware
///
/// Adds the OWASP-recommended response headers to every response, and a
/// cache policy chosen from the request path:
///
/// - confirmation link routes (`/v1/account/...`) carry a live token in the
///   URL and are never cached anywhere: `no-store, no-cache, must-revalidate,
///   private` plus `Pragma: no-cache`
/// - authenticated areas (`/v1/me`, `/v1/admin`) get `no-store` unless the
///   handler chose a policy itself (image downloads do)
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use atelier_api::middleware::security::SecurityHeadersLayer;
///
/// let app: Router = Router::new()
///     .layer(SecurityHeadersLayer::new(true)); // true = production mode
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; \
     connect-src 'self'; frame-ancestors 'none'; form-action 'self'; base-uri 'self'";

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), usb=()";

/// Which caching rules a path falls under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Leave whatever the handler set
    Default,

    /// Authenticated content: `no-store` unless the handler set a policy
    Private,

    /// URL carries a secret: always `no-store`, overriding the handler
    Sensitive,
}

impl CachePolicy {
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/v1/account/") {
            CachePolicy::Sensitive
        } else if path == "/v1/me"
            || path.starts_with("/v1/me/")
            || path.starts_with("/v1/admin/")
            || path == "/v1/admin"
        {
            CachePolicy::Private
        } else {
            CachePolicy::Default
        }
    }

    fn apply(self, headers: &mut HeaderMap) {
        match self {
            CachePolicy::Default => {}
            CachePolicy::Private => {
                if !headers.contains_key(header::CACHE_CONTROL) {
                    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                }
            }
            CachePolicy::Sensitive => {
                headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
                );
                headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            }
        }
    }
}

/// Security headers middleware layer
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    /// Whether to send Strict-Transport-Security (HTTPS deployments only)
    enable_hsts: bool,
}

impl SecurityHeadersLayer {
    pub fn new(enable_hsts: bool) -> Self {
        Self { enable_hsts }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            enable_hsts: self.enable_hsts,
        }
    }
}

/// Security headers middleware service
#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    enable_hsts: bool,
}

impl<S> Service<Request> for SecurityHeadersMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let cache_policy = CachePolicy::for_path(request.uri().path());
        let future = self.inner.call(request);
        let enable_hsts = self.enable_hsts;

        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();

            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
            headers.insert(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            );
            headers.insert("permissions-policy", HeaderValue::from_static(PERMISSIONS_POLICY));
            headers.insert(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            );

            if enable_hsts {
                headers.insert(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
                );
            }

            cache_policy.apply(headers);

            Ok(response)
        })
    }
}
