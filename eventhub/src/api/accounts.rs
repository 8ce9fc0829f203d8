//! Account endpoints. Callers may only touch their own account.

use super::ApiState;
use crate::booking::{AccountProfile, TokenStatement};
use crate::store::BookingStore;
use crate::types::{Account, AccountId};
use axum::{
    extract::{Path, State},
    Json,
};
use eventhub_web::{AccountHeader, AppError, WebResult};
use serde::Deserialize;
use uuid::Uuid;

/// Profile update
#[derive(Debug, Deserialize)]
pub struct ProfileBody {
    /// Display name
    pub name: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
}

fn own(caller: Uuid, id: Uuid) -> Result<AccountId, AppError> {
    if caller == id {
        Ok(AccountId::from_uuid(id))
    } else {
        Err(AppError::forbidden("Not your account"))
    }
}

/// Create or update the caller's profile.
pub async fn upsert<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(caller): AccountHeader,
    Path(id): Path<Uuid>,
    Json(body): Json<ProfileBody>,
) -> WebResult<Json<Account>> {
    let account = hub
        .upsert_account(AccountProfile {
            id: own(caller, id)?,
            name: body.name,
            phone: body.phone,
        })
        .await?;
    Ok(Json(account))
}

/// Token balance and history.
pub async fn tokens<S: BookingStore>(
    State(hub): State<ApiState<S>>,
    AccountHeader(caller): AccountHeader,
    Path(id): Path<Uuid>,
) -> WebResult<Json<TokenStatement>> {
    let statement = hub.token_history(own(caller, id)?).await?;
    Ok(Json(statement))
}
