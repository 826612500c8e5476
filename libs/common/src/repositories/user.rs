//! User repository for database operations
//!
//! The [`UserRepository`] trait is the only way the services touch users and
//! the subscription graph. Listing operations return empty vectors when
//! nothing matches; callers that treat "nothing" as an error go through
//! [`require_any`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::{
    error::{DatabaseError, RepositoryError, RepositoryResult},
    models::{NewUser, User, normalize_handle},
    password::verify_password_blocking,
};

const USER_COLUMNS: &str = "id, username, password_hash, first_name, middle_name, last_name, \
                            birthday, telegram, telegram_id";

/// User store and subscription graph
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user; fails with `AlreadyExists` on a username or handle clash
    async fn create(&self, new_user: &NewUser) -> RepositoryResult<User>;

    /// Find a user by ID
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;

    /// Find a user by username
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    /// Find a user by Telegram handle (normalized to `@name`)
    async fn find_by_telegram(&self, handle: &str) -> RepositoryResult<Option<User>>;

    /// Get all users
    async fn list(&self) -> RepositoryResult<Vec<User>>;

    /// Insert (`active = true`) or delete (`active = false`) the edge
    /// "`subscriber_id` is notified about `user_id`"
    ///
    /// Returns the user being subscribed to. Both directions are idempotent.
    async fn set_subscription(
        &self,
        user_id: i64,
        subscriber_id: i64,
        active: bool,
    ) -> RepositoryResult<User>;

    /// Users subscribed to `user_id`'s birthday
    async fn list_subscribers(&self, user_id: i64) -> RepositoryResult<Vec<User>>;

    /// Users born on the given month and day of any year
    async fn find_by_birthday(&self, month: u32, day: u32) -> RepositoryResult<Vec<User>>;

    /// Bind a Telegram account id to the user owning `handle`
    ///
    /// The binding is permanent once set: re-binding the same account is a
    /// success, while a different account for an already bound handle yields
    /// `AlreadyExists`, as does an account already bound to another user. An
    /// unknown handle yields `NotFound`.
    async fn bind_telegram_account(&self, telegram_id: i64, handle: &str) -> RepositoryResult<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Look up a user by username and check the password against the stored hash
    async fn authenticate(&self, username: &str, password: &str) -> RepositoryResult<User> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let matches =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !matches {
            return Err(RepositoryError::BadPassword);
        }

        Ok(user)
    }

    /// Subscribe `subscriber_id` to `user_id`'s birthday
    async fn subscribe(&self, user_id: i64, subscriber_id: i64) -> RepositoryResult<User> {
        if user_id == subscriber_id {
            return Err(RepositoryError::SelfSubscription);
        }
        self.set_subscription(user_id, subscriber_id, true).await
    }

    /// Remove the subscription; removing a missing edge succeeds
    async fn unsubscribe(&self, user_id: i64, subscriber_id: i64) -> RepositoryResult<User> {
        self.set_subscription(user_id, subscriber_id, false).await
    }
}

/// Turn an empty listing into `NoneFound`
pub fn require_any(users: Vec<User>) -> RepositoryResult<Vec<User>> {
    if users.is_empty() {
        Err(RepositoryError::NoneFound)
    } else {
        Ok(users)
    }
}

/// Map a driver error onto the repository taxonomy
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::AlreadyExists;
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }

    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Database(DatabaseError::Connection(err))
        }
        _ => RepositoryError::Database(DatabaseError::Query(err)),
    }
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: &NewUser) -> RepositoryResult<User> {
        info!("Creating new user: {}", new_user.username);

        let sql = format!(
            r#"
            INSERT INTO users (username, password_hash, first_name, middle_name, last_name, birthday, telegram)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.middle_name)
            .bind(&new_user.last_name)
            .bind(new_user.birthday)
            .bind(normalize_handle(&new_user.telegram))
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        debug!("Finding user by ID: {}", id);

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        debug!("Finding user by username: {}", username);

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_by_telegram(&self, handle: &str) -> RepositoryResult<Option<User>> {
        let handle = normalize_handle(handle);
        debug!("Finding user by Telegram handle: {}", handle);

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE telegram = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn set_subscription(
        &self,
        user_id: i64,
        subscriber_id: i64,
        active: bool,
    ) -> RepositoryResult<User> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if active {
            info!("User {} subscribes to user {}", subscriber_id, user_id);
            sqlx::query(
                r#"
                INSERT INTO subscriptions (user_id, subscriber_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, subscriber_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(subscriber_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        } else {
            info!("User {} unsubscribes from user {}", subscriber_id, user_id);
            let result =
                sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND subscriber_id = $2")
                    .bind(user_id)
                    .bind(subscriber_id)
                    .execute(&self.pool)
                    .await
                    .map_err(classify)?;

            if result.rows_affected() == 0 {
                debug!(
                    "No subscription of user {} to user {} to remove",
                    subscriber_id, user_id
                );
            }
        }

        Ok(user)
    }

    async fn list_subscribers(&self, user_id: i64) -> RepositoryResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.password_hash, u.first_name, u.middle_name, u.last_name,
                   u.birthday, u.telegram, u.telegram_id
            FROM users u
            JOIN subscriptions s ON u.id = s.subscriber_id
            WHERE s.user_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_by_birthday(&self, month: u32, day: u32) -> RepositoryResult<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE EXTRACT(MONTH FROM birthday)::INT = $1 AND EXTRACT(DAY FROM birthday)::INT = $2
            ORDER BY id
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(month as i32)
            .bind(day as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn bind_telegram_account(&self, telegram_id: i64, handle: &str) -> RepositoryResult<()> {
        let handle = normalize_handle(handle);
        info!("Binding Telegram account {} to {}", telegram_id, handle);

        let result = sqlx::query(
            r#"
            UPDATE users SET telegram_id = $1, updated_at = NOW()
            WHERE telegram = $2 AND (telegram_id IS NULL OR telegram_id = $1)
            "#,
        )
        .bind(telegram_id)
        .bind(&handle)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            // Either the handle is unknown or it is bound to another account
            return match self.find_by_telegram(&handle).await? {
                Some(_) => Err(RepositoryError::AlreadyExists),
                None => Err(RepositoryError::NotFound),
            };
        }

        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(crate::database::health_check(&self.pool).await?)
    }
}
