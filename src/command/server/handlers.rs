use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE, WWW_AUTHENTICATE};
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::command::server::error::Error;
use crate::command::server::request_ext::HeaderExt;
use crate::command::server::token_service::TokenRequest;
use crate::command::server::ServerContext;
use crate::metrics_provider::{AUTH_ATTEMPTS, METRICS_PROVIDER};
use crate::security::principal::PrincipalKind;
use crate::security::{Action, Namespace, ResourceKind, SecurityContext};
use crate::token::REGISTRY_SERVICE;

type HandlerResult = Result<Response<Full<Bytes>>, Error>;

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HandlerResult {
    let body = serde_json::to_vec(body)?;

    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))?)
}

fn require_authenticated(ctx: &SecurityContext) -> Result<(), Error> {
    if ctx.is_authenticated() {
        Ok(())
    } else {
        Err(Error::Unauthorized("authentication required".to_string()))
    }
}

#[instrument(skip(context, ctx, parts))]
pub async fn handle_token(
    context: &ServerContext,
    ctx: &SecurityContext,
    parts: &Parts,
) -> HandlerResult {
    let request = TokenRequest::from_query(parts.query_pairs());
    if let Some(account) = &request.account {
        debug!("Token requested for account '{account}' by '{}'", ctx.username());
    }

    let response = context.token_service.issue(ctx, &request).await?;
    json_response(StatusCode::OK, &response)
}

/// Registry ping: sends unauthenticated clients to the token endpoint.
pub fn handle_api_version(context: &ServerContext, ctx: &SecurityContext) -> HandlerResult {
    if ctx.is_authenticated() {
        return json_response(StatusCode::OK, &json!({}));
    }

    let realm = format!(
        "{}/service/token",
        context.ext_endpoint.as_deref().unwrap_or_default()
    );
    let challenge = format!(r#"Bearer realm="{realm}",service="{REGISTRY_SERVICE}""#);
    let challenge = HeaderValue::from_str(&challenge)
        .map_err(|error| Error::Internal(format!("Invalid challenge header: {error}")))?;

    let mut response =
        Error::Unauthorized("authentication required".to_string()).to_response(None);
    response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    Ok(response)
}

#[derive(Deserialize)]
struct LoginForm {
    principal: String,
    password: String,
}

#[instrument(skip(context, body))]
pub async fn handle_login(context: &ServerContext, body: &[u8]) -> HandlerResult {
    let form: LoginForm = serde_urlencoded::from_bytes(body)
        .map_err(|_| Error::BadRequest("invalid login form".to_string()))?;

    let Some(user) = context
        .authenticator
        .authenticate(&form.principal, &form.password)
        .await?
    else {
        AUTH_ATTEMPTS.with_label_values(&["login", "failed"]).inc();
        return Err(Error::Unauthorized("invalid credentials".to_string()));
    };
    AUTH_ATTEMPTS.with_label_values(&["login", "success"]).inc();

    let sessions = &context.sessions;
    let id = sessions.create(&user).await?;
    info!("'{}' logged in", user.username);

    let cookie = format!(
        "{}={id}; Path=/; HttpOnly; Max-Age={}",
        sessions.cookie_name(),
        sessions.ttl()
    );
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(SET_COOKIE, cookie)
        .body(Full::new(Bytes::new()))?)
}

pub async fn handle_logout(context: &ServerContext, parts: &Parts) -> HandlerResult {
    let sessions = &context.sessions;
    if let Some(id) = parts.cookie(sessions.cookie_name()) {
        sessions.destroy(&id).await?;
    }

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", sessions.cookie_name());
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(SET_COOKIE, cookie)
        .body(Full::new(Bytes::new()))?)
}

#[derive(Debug, Serialize)]
struct CurrentUser<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    username: &'a str,
    kind: PrincipalKind,
    sysadmin_flag: bool,
}

pub fn handle_current_user(ctx: &SecurityContext) -> HandlerResult {
    require_authenticated(ctx)?;

    let principal = ctx.principal();
    json_response(
        StatusCode::OK,
        &CurrentUser {
            user_id: principal.user().map(|user| user.user_id),
            username: principal.username(),
            kind: principal.kind(),
            sysadmin_flag: ctx.is_sysadmin(),
        },
    )
}

#[derive(Deserialize)]
struct PermissionsQuery {
    scope: String,
    #[serde(default)]
    relative: bool,
}

#[derive(Debug, Serialize)]
struct Permission {
    resource: String,
    action: Action,
}

/// Every (resource, action) pair the caller holds within one namespace.
#[instrument(skip(ctx, parts))]
pub async fn handle_current_user_permissions(
    ctx: &SecurityContext,
    parts: &Parts,
) -> HandlerResult {
    require_authenticated(ctx)?;

    let query: PermissionsQuery = serde_urlencoded::from_str(parts.uri.query().unwrap_or_default())
        .map_err(|_| Error::BadRequest("invalid permissions query".to_string()))?;
    let namespace: Namespace = query.scope.parse().map_err(Error::BadRequest)?;

    let mut permissions = Vec::new();
    for kind in ResourceKind::ALL {
        let resource = namespace.resource(kind);
        for action in Action::ALL {
            if ctx.can(&resource, action).await? {
                let resource = if query.relative {
                    resource.relative().to_string()
                } else {
                    resource.to_string()
                };
                permissions.push(Permission { resource, action });
            }
        }
    }

    json_response(StatusCode::OK, &permissions)
}

#[derive(Deserialize)]
struct ProxyCacheSecretQuery {
    repository: String,
}

/// Hands the proxy-cache worker a single-use secret for one repository.
pub fn handle_proxy_cache_secret(
    context: &ServerContext,
    ctx: &SecurityContext,
    parts: &Parts,
) -> HandlerResult {
    require_authenticated(ctx)?;
    if !ctx.is_solution_user() {
        return Err(Error::Forbidden(
            "only internal services may request proxy-cache secrets".to_string(),
        ));
    }

    let query: ProxyCacheSecretQuery =
        serde_urlencoded::from_str(parts.uri.query().unwrap_or_default())
            .map_err(|_| Error::BadRequest("repository is required".to_string()))?;
    let repository = query.repository.trim_matches('/');
    if repository.is_empty() {
        return Err(Error::BadRequest("repository is required".to_string()));
    }

    let secret = context.proxy_cache_secrets.generate(repository);
    json_response(StatusCode::CREATED, &json!({ "secret": secret }))
}

pub fn handle_healthz() -> HandlerResult {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

pub fn handle_metrics() -> HandlerResult {
    let (content_type, metrics) = METRICS_PROVIDER.gather()?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from(metrics)))?)
}

pub fn handle_unknown_route(parts: &Parts) -> HandlerResult {
    debug!("Unknown route: {} {}", parts.method, parts.uri.path());
    Err(Error::NotFound(format!("unknown route: {}", parts.uri.path())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::server::server_context::tests::test_server_context;
    use crate::security::principal::RobotAccount;
    use crate::security::Principal;
    use crate::store::User;
    use http_body_util::BodyExt;
    use hyper::header::COOKIE;
    use hyper::Request;
    use serde_json::Value;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    fn context_of(context: &ServerContext, principal: Principal) -> SecurityContext {
        context.middleware.context_for(principal)
    }

    fn alice() -> Principal {
        Principal::User(User {
            user_id: 2,
            username: "alice".to_string(),
            ..User::default()
        })
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_api_version_challenge() {
        let context = test_server_context();

        let response = handle_api_version(&context, &context_of(&context, Principal::Anonymous))
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            r#"Bearer realm="https://harbor.example.com/service/token",service="harbor-registry""#
        );

        let response = handle_api_version(&context, &context_of(&context, alice())).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let context = test_server_context();

        let response = handle_login(&context, b"principal=alice&password=password2")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.ends_with("; Path=/; HttpOnly; Max-Age=1800"));

        let id = cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix("sid="))
            .unwrap()
            .to_string();
        assert_eq!(
            context.sessions.load(&id).await.unwrap().unwrap().username,
            "alice"
        );

        let (logout, ()) = Request::builder()
            .uri("/c/log_out")
            .header(COOKIE, format!("sid={id}"))
            .body(())
            .unwrap()
            .into_parts();
        let response = handle_logout(&context, &logout).await.unwrap();
        assert_eq!(
            response.headers().get(SET_COOKIE).unwrap(),
            "sid=; Path=/; HttpOnly; Max-Age=0"
        );
        assert!(context.sessions.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let context = test_server_context();

        assert!(matches!(
            handle_login(&context, b"principal=alice&password=wrong").await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            handle_login(&context, b"principal=alice").await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let context = test_server_context();

        let response = handle_current_user(&context_of(&context, alice())).unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"user_id": 2, "username": "alice", "kind": "local", "sysadmin_flag": false})
        );

        let robot = Principal::Robot(RobotAccount {
            id: 1,
            name: "robot$ci".to_string(),
            project_id: 7,
            policies: Vec::new(),
        });
        let response = handle_current_user(&context_of(&context, robot)).unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"username": "robot$ci", "kind": "robot", "sysadmin_flag": false})
        );

        assert!(matches!(
            handle_current_user(&context_of(&context, Principal::Anonymous)),
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_current_user_permissions() {
        let context = test_server_context();
        let ctx = context_of(&context, alice());

        // guest of project 7
        let response = handle_current_user_permissions(
            &ctx,
            &parts("/api/v2.0/users/current/permissions?scope=/project/7&relative=true"),
        )
        .await
        .unwrap();
        let permissions = body_json(response).await;
        let permissions = permissions.as_array().unwrap();
        assert!(permissions.contains(&json!({"resource": "repository", "action": "pull"})));
        assert!(!permissions.contains(&json!({"resource": "repository", "action": "push"})));

        let response = handle_current_user_permissions(
            &ctx,
            &parts("/api/v2.0/users/current/permissions?scope=/project/2"),
        )
        .await
        .unwrap();
        let permissions = body_json(response).await;
        assert!(permissions
            .as_array()
            .unwrap()
            .contains(&json!({"resource": "/project/2/repository", "action": "push"})));

        assert!(matches!(
            handle_current_user_permissions(
                &ctx,
                &parts("/api/v2.0/users/current/permissions?scope=/nowhere"),
            )
            .await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_proxy_cache_secret() {
        let context = test_server_context();
        let request = parts("/service/proxy-cache/secrets?repository=library/nginx");

        let jobservice = Principal::Solution {
            name: "jobservice".to_string(),
        };
        let response =
            handle_proxy_cache_secret(&context, &context_of(&context, jobservice), &request)
                .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let secret = body_json(response).await["secret"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(context
            .proxy_cache_secrets
            .verify(&secret, "library/nginx"));

        assert!(matches!(
            handle_proxy_cache_secret(&context, &context_of(&context, alice()), &request),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            handle_proxy_cache_secret(
                &context,
                &context_of(&context, Principal::Anonymous),
                &request
            ),
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = handle_healthz().unwrap();
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }
}
