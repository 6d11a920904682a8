//! User activation.

use std::sync::Arc;

use crate::db::{in_transaction, Store};
use crate::errors::AppError;
use crate::models::User;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Set whether the user may be picked as a reviewer.
    pub async fn set_is_active(&self, user_id: String, is_active: bool) -> Result<User, AppError> {
        let user = in_transaction(self.store.as_ref(), "users.set_is_active", |tx| {
            Box::pin(async move {
                let mut user = tx
                    .get_user(&user_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
                tx.set_user_active(&user_id, is_active).await?;
                user.is_active = is_active;
                Ok(user)
            })
        })
        .await?;

        tracing::info!(user_id = %user.user_id, is_active, "user activity updated");
        Ok(user)
    }
}
