use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, AppJson},
    state::AppState,
    store::Todo,
    todos::dto::{CreateTodoRequest, TodoBody, TodoList, UpdateTodoRequest},
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", post(create_todo).get(list_todos))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(remove_todo),
        )
}

// A malformed id answers exactly like a missing record.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

#[instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let todo = state.todos.insert(payload.into()).await?;
    info!(todo_id = %todo.id, "todo created");
    Ok(Json(todo))
}

#[instrument(skip(state))]
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<TodoList>, ApiError> {
    let todos = state.todos.list().await?;
    Ok(Json(TodoList { todos }))
}

#[instrument(skip(state))]
pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TodoBody>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state.todos.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(TodoBody { todo }))
}

#[instrument(skip(state, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateTodoRequest>,
) -> Result<Json<TodoBody>, ApiError> {
    let id = parse_id(&id)?;
    let changes = payload.into_changes(OffsetDateTime::now_utc());
    let todo = state
        .todos
        .update(id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(todo_id = %todo.id, completed = todo.completed, "todo updated");
    Ok(Json(TodoBody { todo }))
}

#[instrument(skip(state))]
pub async fn remove_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TodoBody>, ApiError> {
    let id = parse_id(&id)?;
    let todo = state.todos.remove(id).await?.ok_or(ApiError::NotFound)?;
    info!(todo_id = %todo.id, "todo removed");
    Ok(Json(TodoBody { todo }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create(state: &AppState, body: serde_json::Value) -> Result<Todo, ApiError> {
        let payload: CreateTodoRequest = serde_json::from_value(body).unwrap();
        create_todo(State(state.clone()), AppJson(payload))
            .await
            .map(|Json(todo)| todo)
    }

    async fn patch(
        state: &AppState,
        id: &str,
        payload: UpdateTodoRequest,
    ) -> Result<Todo, ApiError> {
        update_todo(State(state.clone()), Path(id.to_string()), AppJson(payload))
            .await
            .map(|Json(body)| body.todo)
    }

    #[tokio::test]
    async fn create_then_fetch_roundtrip() {
        let state = AppState::fake();
        let created = create(&state, serde_json::json!({ "text": "X" }))
            .await
            .expect("create");
        assert_eq!(created.text, "X");
        assert!(!created.completed);

        let Json(body) = get_todo(State(state.clone()), Path(created.id.to_string()))
            .await
            .expect("fetch");
        assert_eq!(body.todo.text, "X");
        assert!(!body.todo.completed);
    }

    #[tokio::test]
    async fn create_keeps_completion_fields_verbatim() {
        // Creation intentionally skips the completed/completedAt
        // pairing that updates enforce.
        let state = AppState::fake();
        let created = create(
            &state,
            serde_json::json!({ "text": "Third test todo", "completed": true, "completedAt": 333 }),
        )
        .await
        .expect("create");
        assert!(created.completed);
        assert_eq!(created.completed_at, Some(333));
    }

    #[tokio::test]
    async fn create_rejects_blank_text() {
        let state = AppState::fake();
        let err = create(&state, serde_json::json!({ "text": "  " }))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Persistence(_)));
    }

    #[tokio::test]
    async fn list_preserves_storage_order() {
        let state = AppState::fake();
        for text in ["First test todo", "Second test todo", "Third test todo"] {
            create(&state, serde_json::json!({ "text": text }))
                .await
                .unwrap();
        }
        let Json(list) = list_todos(State(state.clone())).await.unwrap();
        let texts: Vec<_> = list.todos.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["First test todo", "Second test todo", "Third test todo"]
        );
    }

    #[tokio::test]
    async fn list_is_empty_when_nothing_stored() {
        let state = AppState::fake();
        let Json(list) = list_todos(State(state)).await.unwrap();
        assert!(list.todos.is_empty());
    }

    #[tokio::test]
    async fn non_uuid_id_reads_as_not_found() {
        let state = AppState::fake();
        let err = get_todo(State(state.clone()), Path("a1b2c3d4".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        let err = remove_todo(State(state.clone()), Path("a1b2c3d4".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        let err = patch(&state, "a1b2c3d4", UpdateTodoRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn unmatched_uuid_reads_as_not_found() {
        let state = AppState::fake();
        let err = get_todo(State(state), Path(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn completing_an_update_stamps_completed_at() {
        let state = AppState::fake();
        let created = create(&state, serde_json::json!({ "text": "walk the dog" }))
            .await
            .unwrap();

        let updated = patch(
            &state,
            &created.id.to_string(),
            UpdateTodoRequest {
                text: None,
                completed: Some(true),
            },
        )
        .await
        .expect("update");
        assert!(updated.completed);
        assert!(updated.completed_at.is_some());
    }

    #[tokio::test]
    async fn text_only_patch_reopens_the_todo() {
        let state = AppState::fake();
        let created = create(
            &state,
            serde_json::json!({ "text": "Forth test todo", "completed": true, "completedAt": 4444 }),
        )
        .await
        .unwrap();

        let updated = patch(
            &state,
            &created.id.to_string(),
            UpdateTodoRequest {
                text: Some("renamed".into()),
                completed: None,
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.text, "renamed");
        assert!(!updated.completed);
        assert_eq!(updated.completed_at, None);
    }

    #[tokio::test]
    async fn remove_returns_the_record_and_get_stays_gone() {
        let state = AppState::fake();
        let created = create(&state, serde_json::json!({ "text": "walk the dog" }))
            .await
            .unwrap();

        let Json(body) = remove_todo(State(state.clone()), Path(created.id.to_string()))
            .await
            .expect("remove");
        assert_eq!(body.todo.id, created.id);

        let err = get_todo(State(state.clone()), Path(created.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        let err = remove_todo(State(state), Path(created.id.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
