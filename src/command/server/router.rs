use hyper::{Method, Uri};

/// Endpoints served by this process.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Route {
    Healthz,
    Metrics,
    ApiVersion,
    Token,
    Login,
    Logout,
    CurrentUser,
    CurrentUserPermissions,
    ProxyCacheSecret,
    /// Known path, unsupported method.
    MethodNotAllowed,
    Unknown,
}

impl Route {
    pub fn action_name(&self) -> &'static str {
        match self {
            Route::Healthz => "healthz",
            Route::Metrics => "metrics",
            Route::ApiVersion => "get-api-version",
            Route::Token => "issue-token",
            Route::Login => "login",
            Route::Logout => "logout",
            Route::CurrentUser => "get-current-user",
            Route::CurrentUserPermissions => "get-current-user-permissions",
            Route::ProxyCacheSecret => "create-proxy-cache-secret",
            Route::MethodNotAllowed => "method-not-allowed",
            Route::Unknown => "unknown",
        }
    }
}

pub fn parse(method: &Method, uri: &Uri) -> Route {
    let (route, methods): (Route, &[Method]) = match uri.path() {
        "/healthz" => (Route::Healthz, &[Method::GET]),
        "/metrics" => (Route::Metrics, &[Method::GET]),
        "/v2" | "/v2/" => (Route::ApiVersion, &[Method::GET, Method::HEAD]),
        "/service/token" => (Route::Token, &[Method::GET]),
        "/c/login" => (Route::Login, &[Method::POST]),
        "/c/log_out" => (Route::Logout, &[Method::GET, Method::POST]),
        "/api/v2.0/users/current" => (Route::CurrentUser, &[Method::GET]),
        "/api/v2.0/users/current/permissions" => {
            (Route::CurrentUserPermissions, &[Method::GET])
        }
        "/service/proxy-cache/secrets" => (Route::ProxyCacheSecret, &[Method::POST]),
        _ => return Route::Unknown,
    };

    if methods.contains(method) {
        route
    } else {
        Route::MethodNotAllowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: Method, uri: &str) -> Route {
        parse(&method, &uri.parse().unwrap())
    }

    #[test]
    fn test_parse_known_routes() {
        assert_eq!(route(Method::GET, "/healthz"), Route::Healthz);
        assert_eq!(route(Method::GET, "/metrics"), Route::Metrics);
        assert_eq!(route(Method::GET, "/v2"), Route::ApiVersion);
        assert_eq!(route(Method::HEAD, "/v2/"), Route::ApiVersion);
        assert_eq!(route(Method::POST, "/c/login"), Route::Login);
        assert_eq!(route(Method::GET, "/c/log_out"), Route::Logout);
        assert_eq!(route(Method::POST, "/c/log_out"), Route::Logout);
        assert_eq!(
            route(Method::GET, "/api/v2.0/users/current"),
            Route::CurrentUser
        );
        assert_eq!(
            route(
                Method::POST,
                "/service/proxy-cache/secrets?repository=library/nginx"
            ),
            Route::ProxyCacheSecret
        );
    }

    #[test]
    fn test_query_does_not_affect_route() {
        assert_eq!(
            route(
                Method::GET,
                "/service/token?service=harbor-registry&scope=repository:library/a:pull"
            ),
            Route::Token
        );
        assert_eq!(
            route(
                Method::GET,
                "/api/v2.0/users/current/permissions?scope=/project/1&relative=true"
            ),
            Route::CurrentUserPermissions
        );
    }

    #[test]
    fn test_method_not_allowed() {
        assert_eq!(route(Method::POST, "/service/token"), Route::MethodNotAllowed);
        assert_eq!(route(Method::GET, "/c/login"), Route::MethodNotAllowed);
        assert_eq!(route(Method::DELETE, "/v2/"), Route::MethodNotAllowed);
    }

    #[test]
    fn test_unknown_routes() {
        assert_eq!(route(Method::GET, "/v2/library/nginx/manifests/latest"), Route::Unknown);
        assert_eq!(route(Method::GET, "/service/token/"), Route::Unknown);
        assert_eq!(route(Method::GET, "/"), Route::Unknown);
    }

    #[test]
    fn test_action_names_are_distinct() {
        let routes = [
            Route::Healthz,
            Route::Metrics,
            Route::ApiVersion,
            Route::Token,
            Route::Login,
            Route::Logout,
            Route::CurrentUser,
            Route::CurrentUserPermissions,
            Route::ProxyCacheSecret,
            Route::MethodNotAllowed,
            Route::Unknown,
        ];

        let mut names: Vec<_> = routes.iter().map(Route::action_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), routes.len());
    }
}
