use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::{
    claims::Claims,
    dto::{LoginRequest, SignupRequest},
    error::AuthError,
    jwt::{JwtKeys, TokenError},
    password::{hash_password_blocking, verify_password_blocking},
    repo::UserStore,
    repo_types::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Pull the token out of an `Authorization` header value (`Bearer <token>`).
fn bearer_token(header: &str) -> Option<&str> {
    let (_scheme, token) = header.trim().split_once(char::is_whitespace)?;
    Some(token.trim())
}

/// Signup, login and protected-access flows.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
    // Serializes signup's load -> check -> save.
    write_lock: Mutex<()>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self {
            store,
            keys,
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<String, AuthError> {
        let name = req.name.trim();
        let email = req.email.trim();

        let _guard = self.write_lock.lock().await;

        // Existence is decided before field validation.
        let mut users = self.store.load().await?;
        if users.iter().any(|u| u.email == email) {
            warn!(email = %email, "email already registered");
            return Err(AuthError::UserExists);
        }

        if name.is_empty() {
            return Err(AuthError::InvalidInput("Name is required".into()));
        }
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::InvalidInput("Invalid email".into()));
        }
        if req.password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".into()));
        }

        let hash = hash_password_blocking(req.password).await?;
        let user = User::new(name, email, hash);
        let token = self.keys.issue(user.id, &user.name)?;

        users.push(user.clone());
        self.store.save(&users).await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(token)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<String, AuthError> {
        let email = req.email.trim();

        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(AuthError::UserNotFound);
            }
        };

        let ok = verify_password_blocking(req.password, user.password_hash.clone()).await?;
        if !ok {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::WrongPassword);
        }

        let token = self.keys.issue(user.id, &user.name)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(token)
    }

    /// Grants access when the raw `Authorization` header carries a valid token.
    pub fn authorize(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = match header.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => return Err(AuthError::NoToken),
        };

        let token = bearer_token(header).ok_or(AuthError::InvalidToken(TokenError::Malformed))?;
        match self.keys.verify(token) {
            Ok(claims) => Ok(claims),
            Err(e) => {
                warn!(error = %e, "token rejected");
                Err(AuthError::InvalidToken(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::memory::MemoryStore, config::JwtConfig};

    fn service() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let keys = JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            ttl_minutes: 60,
        });
        (AuthService::new(store.clone(), keys), store)
    }

    fn signup_req(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn bearer_token_takes_second_segment() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer   tok "), Some("tok"));
        assert_eq!(bearer_token("Bearer"), None);
    }

    #[tokio::test]
    async fn signup_then_login_issues_distinct_tokens() {
        let (svc, store) = service();
        let t1 = svc
            .signup(signup_req("Alice", "a@x.com", "pw123"))
            .await
            .expect("signup");

        let t2 = svc.login(login_req("a@x.com", "pw123")).await.expect("login");
        assert_ne!(t1, t2);

        let claims = svc.keys().verify(&t2).unwrap();
        assert_eq!(claims.name, "Alice");

        let users = store.load().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, claims.id);
        assert_ne!(users[0].password_hash, "pw123");
    }

    #[tokio::test]
    async fn duplicate_signup_leaves_store_unchanged() {
        let (svc, store) = service();
        svc.signup(signup_req("Alice", "a@x.com", "pw123")).await.unwrap();
        let before = store.load().await.unwrap();

        let err = svc
            .signup(signup_req("Mallory", "a@x.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn immediate_logins_issue_distinct_tokens() {
        let (svc, _) = service();
        for i in 0..5 {
            let email = format!("a{i}@x.com");
            let t1 = svc.signup(signup_req("Alice", &email, "pw123")).await.unwrap();
            let t2 = svc.login(login_req(&email, "pw123")).await.unwrap();
            let t3 = svc.login(login_req(&email, "pw123")).await.unwrap();
            assert_ne!(t1, t2);
            assert_ne!(t2, t3);
        }
    }

    #[tokio::test]
    async fn existing_email_wins_over_field_validation() {
        let (svc, store) = service();
        svc.signup(signup_req("Alice", "a@x.com", "pw123")).await.unwrap();
        let before = store.load().await.unwrap();

        for req in [
            signup_req("Mallory", "a@x.com", ""),
            signup_req("", "a@x.com", "pw"),
            signup_req("", " a@x.com ", ""),
        ] {
            let err = svc.signup(req).await.unwrap_err();
            assert!(matches!(err, AuthError::UserExists));
        }
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn concurrent_signups_for_one_email_create_one_user() {
        let (svc, store) = service();
        let svc = Arc::new(svc);

        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.signup(signup_req("A", "race@x.com", "pw")).await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.signup(signup_req("B", "race@x.com", "pw")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signup_rejects_invalid_input() {
        let (svc, store) = service();
        for req in [
            signup_req("", "a@x.com", "pw"),
            signup_req("Al", "not-an-email", "pw"),
            signup_req("Al", "a@x.com", ""),
        ] {
            let err = svc.signup(req).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidInput(_)));
        }
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_unknown_email() {
        let (svc, _) = service();
        let err = svc.login(login_req("nobody@x.com", "x")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn login_wrong_password() {
        let (svc, _) = service();
        svc.signup(signup_req("Alice", "a@x.com", "pw123")).await.unwrap();
        let err = svc.login(login_req("a@x.com", "pw124")).await.unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));
    }

    #[tokio::test]
    async fn login_with_corrupted_hash_is_wrong_password() {
        let (svc, store) = service();
        store
            .save(&[User::new("Eve", "e@x.com", "garbled".into())])
            .await
            .unwrap();
        let err = svc.login(login_req("e@x.com", "anything")).await.unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));
    }

    #[tokio::test]
    async fn login_email_is_case_sensitive() {
        let (svc, _) = service();
        svc.signup(signup_req("Alice", "a@x.com", "pw123")).await.unwrap();
        let err = svc.login(login_req("A@X.com", "pw123")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn authorize_accepts_issued_token() {
        let (svc, _) = service();
        let token = svc.signup(signup_req("Alice", "a@x.com", "pw123")).await.unwrap();
        let claims = svc.authorize(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(claims.name, "Alice");
    }

    #[test]
    fn authorize_without_header_is_no_token() {
        let (svc, _) = service();
        assert!(matches!(svc.authorize(None), Err(AuthError::NoToken)));
        assert!(matches!(svc.authorize(Some("  ")), Err(AuthError::NoToken)));
    }

    #[test]
    fn authorize_rejects_garbage() {
        let (svc, _) = service();
        for header in ["Bearer garbage", "Bearer", "garbage"] {
            assert!(matches!(
                svc.authorize(Some(header)),
                Err(AuthError::InvalidToken(_))
            ));
        }
    }

    #[test]
    fn authorize_rejects_expired_token() {
        let (svc, _) = service();
        let issued = time::OffsetDateTime::now_utc().unix_timestamp() - 3601;
        let token = svc
            .keys()
            .issue_at(uuid::Uuid::new_v4(), "Old", issued)
            .unwrap();
        let err = svc.authorize(Some(&format!("Bearer {token}"))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(TokenError::Expired)));
    }
}
