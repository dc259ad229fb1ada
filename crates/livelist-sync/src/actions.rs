// File: livelist-sync/src/actions.rs
// Purpose: Mutating admin calls on transactions and top-up requests

use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::error::{Result, SyncError};
use crate::http::ApiClient;
use crate::record::{Record, RecordId, RecordKind, Transaction};

/// Manual status transitions an operator can request on a transaction.
///
/// Each one requires a written reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Retry,
    Cancel,
    MarkSuccess,
    MarkFailed,
}

impl TransactionAction {
    fn path_segment(&self) -> &'static str {
        match self {
            TransactionAction::Retry => "retry",
            TransactionAction::Cancel => "cancel",
            TransactionAction::MarkSuccess => "success",
            TransactionAction::MarkFailed => "mark-failed",
        }
    }
}

/// Admin operations. They never touch a live list; refresh the view afterwards.
#[derive(Debug, Clone)]
pub struct AdminActions {
    client: ApiClient,
}

impl AdminActions {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn retry(&self, uid: &RecordId, reason: &str) -> Result<Value> {
        self.transition(TransactionAction::Retry, uid, reason).await
    }

    pub async fn cancel(&self, uid: &RecordId, reason: &str) -> Result<Value> {
        self.transition(TransactionAction::Cancel, uid, reason).await
    }

    pub async fn mark_success(&self, uid: &RecordId, reason: &str) -> Result<Value> {
        self.transition(TransactionAction::MarkSuccess, uid, reason).await
    }

    pub async fn mark_failed(&self, uid: &RecordId, reason: &str) -> Result<Value> {
        self.transition(TransactionAction::MarkFailed, uid, reason).await
    }

    pub async fn transition(&self, action: TransactionAction, uid: &RecordId, reason: &str) -> Result<Value> {
        let reason = required(reason, "reason")?;
        let path = member_path(RecordKind::Transaction, uid, Some(action.path_segment()));
        tracing::info!(uid = %uid, action = action.path_segment(), "Submitting transaction action");
        self.client
            .send_json(Method::POST, &path, Some(&json!({ "reason": reason })))
            .await
    }

    /// Assign a transaction to the user it belongs to
    pub async fn assign(&self, transaction: &Transaction) -> Result<Value> {
        let user_uid = assignee_for(transaction)
            .ok_or_else(|| SyncError::Validation("no user id found on this transaction".to_string()))?;
        let path = member_path(RecordKind::Transaction, transaction.id(), Some("assign"));
        self.client
            .send_json(Method::POST, &path, Some(&json!({ "user_uid": user_uid })))
            .await
    }

    /// PATCH the given fields of a transaction
    pub async fn update(&self, uid: &RecordId, fields: &Map<String, Value>) -> Result<Value> {
        if fields.is_empty() {
            return Err(SyncError::Validation("nothing to update".to_string()));
        }
        let path = member_path(RecordKind::Transaction, uid, None);
        self.client
            .send_json(Method::PATCH, &path, Some(&Value::Object(fields.clone())))
            .await
    }

    pub async fn delete(&self, uid: &RecordId) -> Result<()> {
        let path = member_path(RecordKind::Transaction, uid, None);
        self.client.send_json(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Approve a top-up request; notes are optional
    pub async fn approve_topup(&self, uid: &RecordId, admin_notes: &str) -> Result<Value> {
        let path = member_path(RecordKind::TopUpRequest, uid, Some("approve"));
        self.client
            .send_json(Method::POST, &path, Some(&json!({ "admin_notes": admin_notes.trim() })))
            .await
    }

    pub async fn reject_topup(&self, uid: &RecordId, rejection_reason: &str) -> Result<Value> {
        let reason = required(rejection_reason, "rejection reason")?;
        let path = member_path(RecordKind::TopUpRequest, uid, Some("reject"));
        self.client
            .send_json(Method::POST, &path, Some(&json!({ "rejection_reason": reason })))
            .await
    }
}

/// User a transaction should be assigned to.
///
/// Looks at `user_uid`, `user_id`, `user.uid` and `owner_uid`, in that order.
pub fn assignee_for(transaction: &Transaction) -> Option<String> {
    let candidates = [
        transaction.get("user_uid"),
        transaction.get("user_id"),
        transaction.get("user").and_then(|user| user.get("uid")),
        transaction.get("owner_uid"),
    ];
    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn required(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Validation(format!("{} is required", what)));
    }
    Ok(trimmed.to_string())
}

fn member_path(kind: RecordKind, id: &RecordId, action: Option<&str>) -> String {
    let id = urlencoding::encode(id.as_str());
    match action {
        Some(action) => format!("{}{}/{}/", kind.endpoint(), id, action),
        None => format!("{}{}/", kind.endpoint(), id),
    }
}
