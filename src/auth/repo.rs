use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, UniqueField, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    DuplicateKey(UniqueField),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence of user accounts. Uniqueness of email and username is enforced
/// by `create` itself, not by callers.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Any user holding this email or this username; an email match wins.
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts the record atomically, failing with `DuplicateKey` when either
    /// unique column is already taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Postgres-backed store relying on the `users_email_key` / `users_username_key` constraints.
#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub(crate) fn unique_field_from_constraint(constraint: &str) -> Option<UniqueField> {
    match constraint {
        "users_email_key" => Some(UniqueField::Email),
        "users_username_key" => Some(UniqueField::Username),
        _ => None,
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(field) = db_err.constraint().and_then(unique_field_from_constraint) {
                return StoreError::DuplicateKey(field);
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, username, email, phone_number, password_hash, created_at
            FROM users
            WHERE email = $1 OR username = $2
            ORDER BY (email = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, username, email, phone_number, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, full_name, username, email, phone_number, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, full_name, username, email, phone_number, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.full_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(
            unique_field_from_constraint("users_email_key"),
            Some(UniqueField::Email)
        );
        assert_eq!(
            unique_field_from_constraint("users_username_key"),
            Some(UniqueField::Username)
        );
        assert_eq!(unique_field_from_constraint("users_pkey"), None);
    }

    #[derive(Debug, Error)]
    #[error("duplicate key value violates unique constraint")]
    struct FakeDbError {
        unique: bool,
        constraint: Option<&'static str>,
    }

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            if self.unique {
                sqlx::error::ErrorKind::UniqueViolation
            } else {
                sqlx::error::ErrorKind::NotNullViolation
            }
        }
    }

    fn unique_violation(constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError {
            unique: true,
            constraint,
        }))
    }

    #[test]
    fn unique_violations_become_duplicate_keys() {
        let err = map_insert_error(unique_violation(Some("users_username_key")));
        assert!(matches!(err, StoreError::DuplicateKey(UniqueField::Username)));

        let err = map_insert_error(unique_violation(Some("users_email_key")));
        assert!(matches!(err, StoreError::DuplicateKey(UniqueField::Email)));
    }

    #[test]
    fn unmapped_database_errors_stay_database_errors() {
        let err = map_insert_error(unique_violation(Some("users_pkey")));
        assert!(matches!(err, StoreError::Database(sqlx::Error::Database(_))));

        let err = map_insert_error(unique_violation(None));
        assert!(matches!(err, StoreError::Database(_)));

        let not_null = sqlx::Error::Database(Box::new(FakeDbError {
            unique: false,
            constraint: Some("users_email_key"),
        }));
        let err = map_insert_error(not_null);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn non_database_errors_pass_through() {
        let err = map_insert_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
