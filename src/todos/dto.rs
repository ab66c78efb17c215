use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::{NewTodo, Todo, TodoChanges};

/// Request body for todo creation. Completion fields are persisted
/// verbatim; creation does not pair `completed` with `completedAt`.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, rename = "completedAt")]
    pub completed_at: Option<i64>,
}

impl From<CreateTodoRequest> for NewTodo {
    fn from(req: CreateTodoRequest) -> Self {
        Self {
            text: req.text,
            completed: req.completed,
            completed_at: req.completed_at,
        }
    }
}

/// Request body for PATCH. An explicit allow-list: only `text` and
/// `completed` are read, anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl UpdateTodoRequest {
    /// The completed/completedAt pairing, enforced on every update:
    /// `completed: true` stamps `completedAt` with `now`, anything
    /// else clears both. A text-only patch therefore re-opens the
    /// todo.
    pub fn into_changes(self, now: OffsetDateTime) -> TodoChanges {
        if self.completed == Some(true) {
            TodoChanges {
                text: self.text,
                completed: true,
                completed_at: Some((now.unix_timestamp_nanos() / 1_000_000) as i64),
            }
        } else {
            TodoChanges {
                text: self.text,
                completed: false,
                completed_at: None,
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct TodoBody {
    pub todo: Todo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn completed_true_stamps_epoch_millis() {
        let req = UpdateTodoRequest {
            text: None,
            completed: Some(true),
        };
        let changes = req.into_changes(datetime!(2018-03-01 00:00:00 UTC));
        assert!(changes.completed);
        assert_eq!(changes.completed_at, Some(1_519_862_400_000));
    }

    #[test]
    fn completed_false_or_absent_clears_the_pair() {
        for completed in [Some(false), None] {
            let changes = UpdateTodoRequest {
                text: Some("walk the dog".into()),
                completed,
            }
            .into_changes(OffsetDateTime::now_utc());
            assert!(!changes.completed);
            assert_eq!(changes.completed_at, None);
            assert_eq!(changes.text.as_deref(), Some("walk the dog"));
        }
    }

    #[test]
    fn patch_body_ignores_unlisted_fields() {
        let req: UpdateTodoRequest = serde_json::from_value(serde_json::json!({
            "text": "new text",
            "completedAt": 333,
            "id": "should be ignored"
        }))
        .expect("unknown fields are ignored");
        assert_eq!(req.text.as_deref(), Some("new text"));
        assert_eq!(req.completed, None);
    }

    #[test]
    fn patch_body_rejects_non_boolean_completed() {
        let result: Result<UpdateTodoRequest, _> = serde_json::from_value(serde_json::json!({
            "completed": "yes"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn create_body_defaults_completion_fields() {
        let req: CreateTodoRequest =
            serde_json::from_value(serde_json::json!({ "text": "buy milk" })).unwrap();
        assert!(!req.completed);
        assert_eq!(req.completed_at, None);
    }
}
