// User persistence

use crate::error::StoreError;
use crate::users::models::{NewUser, UpdateUserRequest, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `Conflict` when the username or email is taken
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// `NotFound` when the user does not exist
    async fn update(&self, id: i64, changes: UpdateUserRequest) -> Result<User, StoreError>;

    /// `NotFound` when the user does not exist
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update(&self, id: i64, changes: UpdateUserRequest) -> Result<User, StoreError> {
        // COALESCE keeps the stored value for omitted fields
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(changes.username)
        .bind(changes.email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Users {
    next_id: i64,
    rows: Vec<User>,
}

impl Users {
    fn is_taken(&self, username: &str, email: &str, except: Option<i64>) -> bool {
        self.rows.iter().any(|user| {
            Some(user.id) != except
                && (user.username == username || user.email.eq_ignore_ascii_case(email))
        })
    }
}

/// In-process user repository, used when no database is configured
#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Users>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.inner.write().await;
        if users.is_taken(&user.username, &user.email, None) {
            return Err(StoreError::Conflict);
        }

        users.next_id += 1;
        let created = User {
            id: users.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
            updated_at: None,
        };
        users.rows.push(created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.rows.clone())
    }

    async fn update(&self, id: i64, changes: UpdateUserRequest) -> Result<User, StoreError> {
        let mut users = self.inner.write().await;
        let current = users
            .rows
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        if users.is_taken(&username, &email, Some(id)) {
            return Err(StoreError::Conflict);
        }

        let user = users
            .rows
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound)?;
        user.username = username;
        user.email = email;
        user.updated_at = Some(Utc::now());
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut users = self.inner.write().await;
        let before = users.rows.len();
        users.rows.retain(|user| user.id != id);
        if users.rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(new_user("alice", "alice@example.com")).await.unwrap();
        let bob = repo.create(new_user("bob", "bob@example.com")).await.unwrap();

        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            repo.create(new_user("alice2", "ALICE@example.com")).await,
            Err(StoreError::Conflict)
        ));
        assert!(matches!(
            repo.create(new_user("alice", "other@example.com")).await,
            Err(StoreError::Conflict)
        ));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn find_by_email_ignores_case() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let found = repo.find_by_email("Alice@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_omitted_fields() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        let updated = repo
            .update(
                alice.id,
                UpdateUserRequest {
                    username: Some("alice_w".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "alice_w");
        assert_eq!(updated.email, "alice@example.com");
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn update_to_taken_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(new_user("alice", "alice@example.com")).await.unwrap();
        repo.create(new_user("bob", "bob@example.com")).await.unwrap();

        let result = repo
            .update(
                alice.id,
                UpdateUserRequest {
                    username: None,
                    email: Some("bob@example.com".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn update_and_delete_missing_user_is_not_found() {
        let repo = InMemoryUserRepository::new();

        assert!(matches!(
            repo.update(9, UpdateUserRequest::default()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(repo.delete(9).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(new_user("alice", "alice@example.com")).await.unwrap();

        repo.delete(alice.id).await.unwrap();
        assert!(repo.find_by_id(alice.id).await.unwrap().is_none());
        assert!(repo.is_empty().await);
    }

    /// SQL-level checks against a real database
    mod postgres {
        use super::*;
        use crate::auth::{PgRefreshTokenStore, RefreshTokenStore};
        use crate::db::create_test_pool;
        use uuid::Uuid;

        async fn repo() -> (PgUserRepository, sqlx::PgPool) {
            let pool = create_test_pool().await;
            (PgUserRepository::new(pool.clone()), pool)
        }

        fn unique_user() -> NewUser {
            let tag = Uuid::new_v4().simple().to_string();
            new_user(&format!("u_{}", &tag[..20]), &format!("{}@example.com", tag))
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn find_by_email_ignores_case() {
            let (repo, _) = repo().await;
            let user = repo.create(unique_user()).await.unwrap();

            let found = repo
                .find_by_email(&user.email.to_uppercase())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.id, user.id);
            assert!(found.updated_at.is_none());
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn duplicate_email_in_other_case_conflicts() {
            let (repo, _) = repo().await;
            let user = repo.create(unique_user()).await.unwrap();

            let mut twin = unique_user();
            twin.email = user.email.to_uppercase();
            assert!(matches!(repo.create(twin).await, Err(StoreError::Conflict)));
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn update_keeps_omitted_fields() {
            let (repo, _) = repo().await;
            let user = repo.create(unique_user()).await.unwrap();
            let renamed = format!("{}_w", &user.username[..20]);

            let updated = repo
                .update(
                    user.id,
                    UpdateUserRequest {
                        username: Some(renamed.clone()),
                        email: None,
                    },
                )
                .await
                .unwrap();

            assert_eq!(updated.username, renamed);
            assert_eq!(updated.email, user.email);
            assert!(updated.updated_at.is_some());
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn delete_cascades_to_refresh_token_and_reports_missing() {
            let (repo, pool) = repo().await;
            let user = repo.create(unique_user()).await.unwrap();
            let sessions = PgRefreshTokenStore::new(pool);
            let token = format!("token-{}", Uuid::new_v4());
            sessions
                .save(user.id, &token, Utc::now() + chrono::Duration::days(7))
                .await
                .unwrap();

            repo.delete(user.id).await.unwrap();

            assert!(!sessions.is_valid(&token).await.unwrap());
            assert!(repo.find_by_id(user.id).await.unwrap().is_none());
            assert!(matches!(repo.delete(user.id).await, Err(StoreError::NotFound)));
            assert!(matches!(
                repo.update(user.id, UpdateUserRequest::default()).await,
                Err(StoreError::NotFound)
            ));
        }
    }
}
