use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{NewTodo, StoreError, Todo, TodoChanges, TodoStore, TokenEntry, User, UserStore};

/// In-memory stand-ins for the Postgres stores, used by tests so the
/// whole request path runs without a database. Locks are never held
/// across an await point.
#[derive(Default)]
pub struct MemUserStore {
    inner: RwLock<Vec<(User, Vec<TokenEntry>)>>,
}

impl MemUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemUserStore {
    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.inner.write().unwrap();
        if users.iter().any(|(u, _)| u.email == email) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push((user.clone(), Vec::new()));
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.inner.read().unwrap();
        Ok(users
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn find_by_token(
        &self,
        id: Uuid,
        token: &str,
        scope: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.inner.read().unwrap();
        Ok(users
            .iter()
            .find(|(u, entries)| {
                u.id == id && entries.iter().any(|e| e.token == token && e.scope == scope)
            })
            .map(|(u, _)| u.clone()))
    }

    async fn push_token(
        &self,
        user_id: Uuid,
        scope: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        let mut users = self.inner.write().unwrap();
        let (_, entries) = users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        entries.push(TokenEntry {
            scope: scope.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let mut users = self.inner.write().unwrap();
        let (_, entries) = users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        entries.retain(|e| e.token != token);
        Ok(())
    }

    async fn tokens(&self, user_id: Uuid) -> Result<Vec<TokenEntry>, StoreError> {
        let users = self.inner.read().unwrap();
        Ok(users
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(_, entries)| entries.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemTodoStore {
    inner: RwLock<Vec<Todo>>,
}

impl MemTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemTodoStore {
    async fn insert(&self, new: NewTodo) -> Result<Todo, StoreError> {
        let text = new.text.trim().to_string();
        if text.is_empty() {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "todo text must not be empty"
            )));
        }
        let todo = Todo {
            id: Uuid::new_v4(),
            text,
            completed: new.completed,
            completed_at: new.completed_at,
        };
        self.inner.write().unwrap().push(todo.clone());
        Ok(todo)
    }

    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        Ok(self.inner.read().unwrap().clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let todos = self.inner.read().unwrap();
        Ok(todos.iter().find(|t| t.id == id).cloned())
    }

    async fn update(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>, StoreError> {
        let mut todos = self.inner.write().unwrap();
        let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            todo.text = text;
        }
        todo.completed = changes.completed;
        todo.completed_at = changes.completed_at;
        Ok(Some(todo.clone()))
    }

    async fn remove(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let mut todos = self.inner.write().unwrap();
        let Some(pos) = todos.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        Ok(Some(todos.remove(pos)))
    }
}
