use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    dto::{AuthOutcome, LoginRequest, MissingFields, PublicUser, RegisterRequest},
    errors::AuthError,
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_against_dummy, verify_password_blocking},
    repo::AccountStore,
    repo_types::{NewUser, UniqueField},
};

const PHONE_MAX_DIGITS: usize = 10;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keeps ASCII digits only, truncated to ten.
pub(crate) fn normalize_phone(phone: &str) -> String {
    lazy_static! {
        static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
    }
    let mut digits = NON_DIGIT.replace_all(phone, "").into_owned();
    digits.truncate(PHONE_MAX_DIGITS);
    digits
}

/// Text fields count as missing when blank; passwords only when empty.
fn text_field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn secret_field(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Registration and login against an injected account store.
#[derive(Clone)]
pub struct CredentialService {
    accounts: Arc<dyn AccountStore>,
    keys: JwtKeys,
}

impl CredentialService {
    pub fn new(accounts: Arc<dyn AccountStore>, keys: JwtKeys) -> Self {
        Self { accounts, keys }
    }

    /// Keys for verifying issued tokens.
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthOutcome, AuthError> {
        let full_name = text_field(&req.full_name);
        let username = text_field(&req.username);
        let email = text_field(&req.email);
        let phone_number = text_field(&req.phone_number);
        let password = secret_field(&req.password);
        let confirm_password = secret_field(&req.confirm_password);

        let (
            Some(full_name),
            Some(username),
            Some(email),
            Some(phone_number),
            Some(password),
            Some(confirm_password),
        ) = (full_name, username, email, phone_number, password, confirm_password)
        else {
            let missing = MissingFields::from([
                ("fullName", full_name.is_none()),
                ("username", username.is_none()),
                ("email", email.is_none()),
                ("phoneNumber", phone_number.is_none()),
                ("password", password.is_none()),
                ("confirmPassword", confirm_password.is_none()),
            ]);
            warn!(?missing, "registration missing fields");
            return Err(AuthError::missing("Missing required fields", missing));
        };

        let email = normalize_email(email);

        if let Some(existing) = self
            .accounts
            .find_by_email_or_username(&email, username)
            .await?
        {
            let field = if existing.email == email {
                UniqueField::Email
            } else {
                UniqueField::Username
            };
            warn!(%field, "registration conflicts with existing user");
            return Err(AuthError::Conflict(field));
        }

        if password != confirm_password {
            return Err(AuthError::validation("Passwords do not match"));
        }

        let phone_number = normalize_phone(phone_number);
        if phone_number.is_empty() {
            return Err(AuthError::validation("Phone number must contain digits"));
        }

        let password_hash = hash_password_blocking(password.to_owned()).await?;

        let user = self
            .accounts
            .create(NewUser {
                full_name: full_name.to_owned(),
                username: username.to_owned(),
                email,
                phone_number,
                password_hash,
            })
            .await
            .map_err(|e| {
                let e = AuthError::from(e);
                if let AuthError::InUse(field) = &e {
                    warn!(%field, "registration lost uniqueness race");
                }
                e
            })?;

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, username = %user.username, email = %user.email, "user registered");
        Ok(AuthOutcome {
            token,
            user: PublicUser::from(user),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthOutcome, AuthError> {
        let email = text_field(&req.email);
        let password = secret_field(&req.password);
        let (Some(email), Some(password)) = (email, password) else {
            let missing =
                MissingFields::from([("email", email.is_none()), ("password", password.is_none())]);
            return Err(AuthError::missing("Email and password are required", missing));
        };

        let email = normalize_email(email);

        let Some(user) = self.accounts.find_by_email(&email).await? else {
            verify_against_dummy(password.to_owned()).await;
            warn!("login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = verify_password_blocking(password.to_owned(), user.password_hash.clone()).await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthOutcome {
            token,
            user: PublicUser::from(user),
        })
    }
}
