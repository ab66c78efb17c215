use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{MemTodoStore, MemUserStore};
pub use postgres::{PgTodoStore, PgUserStore};

/// Failures surfaced by the backing store. The HTTP layer translates
/// these into response codes; `Backend` carries the driver detail for
/// the log only.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// One entry in a user's list of currently valid bearer tokens.
/// Duplicates are allowed; revocation removes matching entries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenEntry {
    pub scope: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

/// Allow-listed changes applied by a todo update. `text: None` keeps
/// the stored text; `completed`/`completed_at` always overwrite.
#[derive(Debug, Clone)]
pub struct TodoChanges {
    pub text: Option<String>,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. `Duplicate` when the email is already taken.
    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Find the user with the given id whose active token list holds an
    /// entry matching both `token` and `scope`. `None` covers revoked
    /// and foreign tokens alike.
    async fn find_by_token(
        &self,
        id: Uuid,
        token: &str,
        scope: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Append a token entry to the user's list. Entries are ordered and
    /// never deduplicated.
    async fn push_token(&self, user_id: Uuid, scope: &str, token: &str)
        -> Result<(), StoreError>;

    /// Remove every entry matching `token` from the user's list.
    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError>;

    async fn tokens(&self, user_id: Uuid) -> Result<Vec<TokenEntry>, StoreError>;
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Persist a new todo as given. Rejects empty text.
    async fn insert(&self, new: NewTodo) -> Result<Todo, StoreError>;

    /// All todos in storage order.
    async fn list(&self) -> Result<Vec<Todo>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StoreError>;

    /// Apply `changes` to the matching record, returning the updated
    /// row, or `None` when no record matches.
    async fn update(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>, StoreError>;

    /// Delete permanently, returning the removed record.
    async fn remove(&self, id: Uuid) -> Result<Option<Todo>, StoreError>;
}
