use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::command::server::error::Error;
use crate::command::server::router::{self, Route};
use crate::command::server::{handlers, ServerContext};
use crate::metrics_provider::{IN_FLIGHT_REQUESTS, METRICS_PROVIDER};
use crate::security::SecurityContext;

/// Largest request body accepted; only the login form carries one.
const MAX_BODY_SIZE: usize = 64 * 1024;

fn set_in_flight_gauge() {
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );
}

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |request| handle_request(Arc::clone(&context), request)),
    );
    pin!(conn);

    IN_FLIGHT_REQUESTS.fetch_add(1, Ordering::Relaxed);
    set_in_flight_gauge();

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(error) = res {
                    debug!("Error serving connection: {error}");
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("Timeout {iter} reached, shutting the connection down");
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    IN_FLIGHT_REQUESTS.fetch_sub(1, Ordering::Relaxed);
    set_in_flight_gauge();
}

#[instrument(skip(context, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();
    let route_action = router::parse(request.method(), request.uri()).action_name();

    let trace_id = {
        let context = Span::current().context();
        let span = context.span();
        let span_context = span.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    };

    let response = match route_request(&context, request).await {
        Ok(response) => response,
        Err(error) => error.to_response(trace_id.as_deref()),
    };

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), route_action, status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .with_label_values(&[method.as_str(), route_action])
        .observe(elapsed);

    let log = if let Some(trace_id) = trace_id {
        format!("{trace_id} {elapsed:?} - {status} {method} {path}")
    } else {
        format!("{elapsed:?} - {status} {method} {path}")
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

async fn read_body<B>(body: B) -> Result<Bytes, Error>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_SIZE).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(error) => {
            debug!("Unable to read request body: {error}");
            Err(Error::BadRequest("Unable to read request body".to_string()))
        }
    }
}

/// Health and metrics are answered without looking at credentials.
pub async fn route_request<B>(
    context: &ServerContext,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Error>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = request.into_parts();

    match router::parse(&parts.method, &parts.uri) {
        Route::Healthz => handlers::handle_healthz(),
        Route::Metrics => handlers::handle_metrics(),
        Route::Unknown => handlers::handle_unknown_route(&parts),
        Route::MethodNotAllowed => Err(Error::MethodNotAllowed),
        route => {
            let ctx = context.middleware.security_context(&parts).await;
            dispatch_route(context, &ctx, route, &parts, body).await
        }
    }
}

#[instrument(skip(context, ctx, parts, body), fields(principal = ctx.username()))]
async fn dispatch_route<B>(
    context: &ServerContext,
    ctx: &SecurityContext,
    route: Route,
    parts: &Parts,
    body: B,
) -> Result<Response<Full<Bytes>>, Error>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match route {
        Route::Token => handlers::handle_token(context, ctx, parts).await,
        Route::ApiVersion => handlers::handle_api_version(context, ctx),
        Route::Login => {
            let body = read_body(body).await?;
            handlers::handle_login(context, &body).await
        }
        Route::Logout => handlers::handle_logout(context, parts).await,
        Route::CurrentUser => handlers::handle_current_user(ctx),
        Route::CurrentUserPermissions => {
            handlers::handle_current_user_permissions(ctx, parts).await
        }
        Route::ProxyCacheSecret => handlers::handle_proxy_cache_secret(context, ctx, parts),
        Route::Healthz => handlers::handle_healthz(),
        Route::Metrics => handlers::handle_metrics(),
        Route::MethodNotAllowed => Err(Error::MethodNotAllowed),
        Route::Unknown => handlers::handle_unknown_route(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::server::server_context::tests::test_server_context;
    use crate::security::Principal;
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;
    use hyper::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE, WWW_AUTHENTICATE};
    use hyper::{Method, StatusCode};
    use serde_json::{json, Value};

    fn request(method: Method, uri: &str) -> hyper::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", BASE64_STANDARD.encode(credentials))
    }

    async fn send(
        context: &ServerContext,
        request: hyper::http::request::Builder,
        body: &'static str,
    ) -> Response<Full<Bytes>> {
        let request = request.body(Full::new(Bytes::from(body))).unwrap();
        match route_request(context, request).await {
            Ok(response) => response,
            Err(error) => error.to_response(None),
        }
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_public_routes() {
        let context = test_server_context();

        let response = send(&context, request(Method::GET, "/healthz"), "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&context, request(Method::GET, "/metrics"), "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let response = send(&context, request(Method::GET, "/nowhere"), "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&context, request(Method::PUT, "/service/token"), "").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_expired_robot_login_is_refused() {
        let context = test_server_context();

        let response = send(
            &context,
            request(Method::GET, "/service/token?service=harbor-registry")
                .header(AUTHORIZATION, basic("robot$r2:Robot-Secret1")),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        // the same secret still works for the live robot
        let response = send(
            &context,
            request(Method::GET, "/service/token?service=harbor-registry")
                .header(AUTHORIZATION, basic("robot$ci:Robot-Secret1")),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_docker_login_flow() {
        let context = test_server_context();

        // ping without credentials points at the token endpoint
        let response = send(&context, request(Method::GET, "/v2/"), "").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .get(WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Bearer realm="));

        // anonymous login probe
        let response = send(
            &context,
            request(Method::GET, "/service/token?service=harbor-registry"),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        // the client retries with credentials
        let response = send(
            &context,
            request(
                Method::GET,
                "/service/token?service=harbor-registry&scope=repository:priv/app:pull,push",
            )
            .header(AUTHORIZATION, basic("alice:password2")),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();

        // and presents the minted token to the registry ping
        let response = send(
            &context,
            request(Method::GET, "/v2/").header(AUTHORIZATION, format!("Bearer {token}")),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_minted_token_carries_filtered_access() {
        let context = test_server_context();

        let response = send(
            &context,
            request(
                Method::GET,
                "/service/token?service=harbor-registry&scope=repository:team/app:pull,push",
            )
            .header(AUTHORIZATION, basic("alice:password2")),
            "",
        )
        .await;
        let token = body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();

        let (parts, ()) = Request::builder()
            .uri("/v2/team/app/manifests/latest")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts();
        let ctx = context.middleware.security_context(&parts).await;
        assert_eq!(ctx.username(), "alice");

        let Principal::Token { access, .. } = ctx.principal() else {
            panic!("expected a token principal");
        };
        assert_eq!(access[0].actions, vec!["pull".to_string()]);
    }

    #[tokio::test]
    async fn test_browser_session_flow() {
        let context = test_server_context();

        let response = send(
            &context,
            request(Method::POST, "/c/login")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
            "principal=admin&password=password1",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let response = send(
            &context,
            request(Method::GET, "/api/v2.0/users/current").header(COOKIE, &cookie),
            "",
        )
        .await;
        assert_eq!(
            body_json(response).await,
            json!({"user_id": 1, "username": "admin", "kind": "local", "sysadmin_flag": true})
        );

        let response = send(
            &context,
            request(Method::POST, "/c/log_out").header(COOKIE, &cookie),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &context,
            request(Method::GET, "/api/v2.0/users/current").header(COOKIE, &cookie),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_proxy_cache_round_trip() {
        let context = test_server_context();

        let response = send(
            &context,
            request(
                Method::POST,
                "/service/proxy-cache/secrets?repository=library/nginx",
            )
            .header(AUTHORIZATION, "Harbor-Secret js-secret"),
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let secret = body_json(response).await["secret"]
            .as_str()
            .unwrap()
            .to_string();

        let (parts, ()) = Request::builder()
            .uri("/v2/library/nginx/manifests/latest")
            .header(AUTHORIZATION, format!("Proxy-Cache-Secret {secret}"))
            .body(())
            .unwrap()
            .into_parts();
        let ctx = context.middleware.security_context(&parts).await;
        assert_eq!(
            ctx.principal(),
            &Principal::ProxyCache {
                repository: "library/nginx".to_string()
            }
        );

        // single use
        let ctx = context.middleware.security_context(&parts).await;
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let context = test_server_context();
        let body = "a".repeat(MAX_BODY_SIZE + 1);

        let request = request(Method::POST, "/c/login")
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        assert!(matches!(
            route_request(&context, request).await,
            Err(Error::BadRequest(_))
        ));
    }
}
