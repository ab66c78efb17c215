use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewTodo, StoreError, Todo, TodoChanges, TokenEntry, User, UserStore, TodoStore};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.into())
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StoreError::Duplicate
            } else {
                backend(e)
            }
        })?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(user)
    }

    async fn find_by_token(
        &self,
        id: Uuid,
        token: &str,
        scope: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.created_at
            FROM users u
            JOIN user_tokens t ON t.user_id = u.id
            WHERE u.id = $1 AND t.token = $2 AND t.scope = $3
            LIMIT 1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(user)
    }

    async fn push_token(
        &self,
        user_id: Uuid,
        scope: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, scope, token)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(scope)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM user_tokens
            WHERE user_id = $1 AND token = $2
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn tokens(&self, user_id: Uuid) -> Result<Vec<TokenEntry>, StoreError> {
        let entries = sqlx::query_as::<_, TokenEntry>(
            r#"
            SELECT scope, token
            FROM user_tokens
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(entries)
    }
}

#[derive(Clone)]
pub struct PgTodoStore {
    pool: PgPool,
}

impl PgTodoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn insert(&self, new: NewTodo) -> Result<Todo, StoreError> {
        let text = new.text.trim().to_string();
        if text.is_empty() {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "todo text must not be empty"
            )));
        }
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (text, completed, completed_at)
            VALUES ($1, $2, $3)
            RETURNING id, text, completed, completed_at
            "#,
        )
        .bind(text)
        .bind(new.completed)
        .bind(new.completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(todo)
    }

    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, text, completed, completed_at
            FROM todos
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, text, completed, completed_at
            FROM todos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(todo)
    }

    async fn update(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
            SET text = COALESCE($2, text),
                completed = $3,
                completed_at = $4
            WHERE id = $1
            RETURNING id, text, completed, completed_at
            "#,
        )
        .bind(id)
        .bind(changes.text)
        .bind(changes.completed)
        .bind(changes.completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(todo)
    }

    async fn remove(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            r#"
            DELETE FROM todos
            WHERE id = $1
            RETURNING id, text, completed, completed_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(todo)
    }
}
