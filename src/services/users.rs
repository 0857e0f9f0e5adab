use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{user::UserView, Role, UserAccount},
    store::{Record, Repository, SharedStore},
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must have 8 to 128 characters"))]
    pub password: String,
    pub role: Option<Role>,
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct UserService {
    users: Repository<UserAccount>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl UserService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            users: Repository::new(store),
            event_sender,
            logger,
        }
    }

    pub async fn list(&self) -> Result<Vec<UserView>, ServiceError> {
        Ok(self.users.list().await?.iter().map(UserView::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<UserAccount, ServiceError> {
        self.users.get(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .find_by(|u| u.email == email)
            .await?
            .into_iter()
            .next())
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: NewUser) -> Result<UserAccount, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "a user with email {} already exists",
                email
            )));
        }

        let now = Utc::now();
        let user = UserAccount {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email,
            password_hash: hash_password(&input.password)?,
            role: input.role.unwrap_or_default(),
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let saved = self.users.insert(&user).await?;
        self.event_sender
            .send_or_log(Event::created(UserAccount::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "user created"; "user_id" => %saved.id, "role" => saved.role.as_ref());
        Ok(saved)
    }

    /// Checks the credentials and stamps `last_login_at`. Unknown email and
    /// wrong password are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserAccount, ServiceError> {
        let invalid = || ServiceError::Unauthorized("invalid email or password".into());
        let Some(mut user) = self.find_by_email(email).await? else {
            return Err(invalid());
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid());
        }
        if !user.active {
            return Err(ServiceError::Forbidden("account is disabled".into()));
        }

        user.last_login_at = Some(Utc::now());
        let user = self.users.save(&user).await?;
        slog::info!(self.logger, "user logged in"; "user_id" => %user.id);
        Ok(user)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<UserAccount, ServiceError> {
        let mut user = self.users.get(id).await?;
        user.active = active;
        let saved = self.users.save(&user).await?;
        self.event_sender
            .send_or_log(Event::updated(UserAccount::COLLECTION, id))
            .await;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::services;
    use assert_matches::assert_matches;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ana".into(),
            email: email.into(),
            password: "correct horse".into(),
            role: Some(Role::Manager),
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("other", &hash).unwrap());
    }

    #[tokio::test]
    async fn emails_are_unique_and_case_insensitive() {
        let svc = services().users;
        let user = svc.create_user(new_user("Ana@Example.com")).await.unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert_ne!(user.password_hash, "correct horse");
        assert_matches!(
            svc.create_user(new_user("ana@example.com")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn authentication_checks_password_and_active_flag() {
        let svc = services().users;
        let user = svc.create_user(new_user("ana@example.com")).await.unwrap();

        let logged = svc
            .authenticate("ANA@example.com", "correct horse")
            .await
            .unwrap();
        assert!(logged.last_login_at.is_some());

        assert_matches!(
            svc.authenticate("ana@example.com", "wrong").await,
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            svc.authenticate("nobody@example.com", "correct horse").await,
            Err(ServiceError::Unauthorized(_))
        );

        svc.set_active(user.id, false).await.unwrap();
        assert_matches!(
            svc.authenticate("ana@example.com", "correct horse").await,
            Err(ServiceError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn short_passwords_are_rejected() {
        let svc = services().users;
        let mut weak = new_user("a@example.com");
        weak.password = "short".into();
        assert_matches!(svc.create_user(weak).await, Err(ServiceError::ValidationError(_)));
    }
}
