use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::command::server::auth::{rejected, AuthRequest, CredentialGenerator};
use crate::command::server::request_ext::HeaderExt;
use crate::security::Principal;
use crate::session::Sessions;

pub struct SessionCookie {
    sessions: Arc<Sessions>,
}

impl SessionCookie {
    pub fn new(sessions: Arc<Sessions>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl CredentialGenerator for SessionCookie {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn generate(&self, request: &AuthRequest<'_>) -> Option<Principal> {
        let id = request.parts.cookie(self.sessions.cookie_name())?;

        match self.sessions.load(&id).await {
            Ok(Some(user)) => Some(Principal::User(user)),
            Ok(None) => {
                debug!("Session cookie refers to no live session");
                None
            }
            Err(error) => rejected(self.name(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::AuthMode;
    use crate::session::tests::memory_sessions;
    use crate::store::User;
    use hyper::header::COOKIE;
    use hyper::Request;

    async fn run(sessions: Arc<Sessions>, cookie: &str) -> Option<Principal> {
        let (parts, ()) = Request::builder()
            .uri("/api/v2.0/users/current")
            .header(COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();

        SessionCookie::new(sessions)
            .generate(&AuthRequest {
                parts: &parts,
                auth_mode: AuthMode::DbAuth,
            })
            .await
    }

    #[tokio::test]
    async fn test_session_cookie() {
        let sessions = Arc::new(memory_sessions());
        let user = User {
            user_id: 2,
            username: "alice".to_string(),
            ..User::default()
        };
        let id = sessions.create(&user).await.unwrap();

        let principal = run(sessions.clone(), &format!("sid={id}")).await;
        assert_eq!(principal, Some(Principal::User(user)));

        assert!(run(sessions.clone(), "sid=unknown").await.is_none());
        assert!(run(sessions, &format!("other={id}")).await.is_none());
    }
}
