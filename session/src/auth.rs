//! Local accounts kept in preferences.

use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::prefs::{AppPreferences, PersistenceError, AUTH_USERS, CURRENT_USER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub username: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    username: String,
    password: String,
    role: UserRole,
}

impl StoredUser {
    fn to_session(&self) -> AuthSession {
        AuthSession {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username and password are required")]
    MissingFields,
    #[error("User already exists")]
    UserExists,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

fn default_users() -> Vec<StoredUser> {
    vec![
        StoredUser {
            username: "admin".into(),
            password: "admin".into(),
            role: UserRole::Admin,
        },
        StoredUser {
            username: "usuario1".into(),
            password: "usuario1".into(),
            role: UserRole::User,
        },
    ]
}

/// Username/password accounts stored alongside the other preferences.
/// Usernames match case-insensitively.
#[derive(Clone)]
pub struct LocalAuth {
    prefs: AppPreferences,
}

impl LocalAuth {
    pub fn new(prefs: AppPreferences) -> Self {
        Self { prefs }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self
            .find_user(username.trim())?
            .filter(|u| u.password == password)
            .ok_or(AuthError::InvalidCredentials)?;
        self.prefs.set_current_user(Some(&user.username))?;
        tracing::info!(user = %user.username, "Logged in");
        Ok(user.to_session())
    }

    pub fn register(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }
        let mut users = self.load_users()?;
        if users.iter().any(|u| u.username.eq_ignore_ascii_case(username)) {
            return Err(AuthError::UserExists);
        }
        let user = StoredUser {
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::User,
        };
        let session = user.to_session();
        users.push(user);
        self.save_users(&users)?;
        self.prefs.set_current_user(Some(username))?;
        tracing::info!(user = %username, "Registered");
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.prefs.set_current_user(None)?;
        Ok(())
    }

    /// The logged-in user, if any.
    pub fn session(&self) -> Option<AuthSession> {
        let username = self.prefs.current_user()?;
        match self.find_user(&username) {
            Ok(user) => user.map(|u| u.to_session()),
            Err(e) => {
                tracing::warn!("Reading users: {}", e);
                None
            }
        }
    }

    /// Current session, then one item per login or logout.
    pub fn session_updates(&self) -> impl Stream<Item = Option<AuthSession>> + Send + 'static {
        let auth = self.clone();
        WatchStream::new(self.prefs.store().observe(CURRENT_USER)).map(move |user| {
            user.filter(|u| !u.is_empty())
                .and_then(|u| auth.find_user(&u).ok().flatten())
                .map(|u| u.to_session())
        })
    }

    fn find_user(&self, username: &str) -> Result<Option<StoredUser>, PersistenceError> {
        Ok(self
            .load_users()?
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }

    /// Missing or corrupt user lists are replaced by the default accounts.
    fn load_users(&self) -> Result<Vec<StoredUser>, PersistenceError> {
        let stored = self.prefs.store().get(AUTH_USERS).unwrap_or_default();
        if !stored.trim().is_empty() {
            match serde_json::from_str(&stored) {
                Ok(users) => return Ok(users),
                Err(e) => tracing::warn!("Resetting corrupt user list: {}", e),
            }
        }
        let users = default_users();
        self.save_users(&users)?;
        Ok(users)
    }

    fn save_users(&self, users: &[StoredUser]) -> Result<(), PersistenceError> {
        self.prefs
            .store()
            .set(AUTH_USERS, serde_json::to_string(users)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> LocalAuth {
        LocalAuth::new(AppPreferences::in_memory())
    }

    #[test]
    fn test_default_users_can_log_in() {
        let auth = auth();
        let session = auth.login("ADMIN", "admin").unwrap();
        assert_eq!(session.username, "admin");
        assert_eq!(session.role, UserRole::Admin);
        assert_eq!(auth.session(), Some(session));

        let user = auth.login(" usuario1 ", "usuario1").unwrap();
        assert_eq!(user.role, UserRole::User);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = auth();
        assert!(matches!(
            auth.login("admin", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "x"),
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(auth.session(), None);
    }

    #[test]
    fn test_register_then_logout() {
        let auth = auth();
        let session = auth.register("carol", "secret").unwrap();
        assert_eq!(session.role, UserRole::User);
        assert_eq!(auth.session().unwrap().username, "carol");

        assert!(matches!(auth.register("Carol", "x"), Err(AuthError::UserExists)));
        assert!(matches!(auth.register("  ", "x"), Err(AuthError::MissingFields)));
        assert!(matches!(auth.register("dave", ""), Err(AuthError::MissingFields)));

        auth.logout().unwrap();
        assert_eq!(auth.session(), None);
        assert_eq!(auth.login("carol", "secret").unwrap().username, "carol");
    }

    #[test]
    fn test_corrupt_user_list_resets_to_defaults() {
        let prefs = AppPreferences::in_memory();
        prefs.store().set(AUTH_USERS, "[{".into()).unwrap();
        let auth = LocalAuth::new(prefs);
        assert!(auth.login("admin", "admin").is_ok());
    }

    #[tokio::test]
    async fn test_session_updates_follow_login_state() {
        let auth = auth();
        let updates = auth.session_updates();
        tokio::pin!(updates);
        assert_eq!(updates.next().await, Some(None));

        auth.login("admin", "admin").unwrap();
        let next = updates.next().await.unwrap();
        assert_eq!(next.map(|s| s.username).as_deref(), Some("admin"));

        auth.logout().unwrap();
        assert_eq!(updates.next().await, Some(None));
    }
}
