// handlers/tenant/departments.rs - /api/departments[/:id]

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use uuid::Uuid;

use super::require_manager;
use crate::database::models::{Department, User};
use crate::database::Row;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, CurrentTenant};
use crate::state::AppState;
use crate::tenancy::{TenancyError, TenantContext};

#[derive(Debug, Deserialize)]
pub struct DepartmentInput {
    pub name: String,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
}

/// Fields a PATCH may change. A nullable field sent as `null` is cleared;
/// an absent one is left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepartmentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub branch_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub manager_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl DepartmentPatch {
    fn into_changes(self) -> Result<Row, ApiError> {
        let mut changes = Row::new();
        if let Some(name) = self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::validation_error("Department name is required", None));
            }
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(branch_name) = self.branch_name {
            changes.insert("branch_name".to_string(), json!(branch_name));
        }
        if let Some(description) = self.description {
            changes.insert("description".to_string(), json!(description));
        }
        if let Some(manager_id) = self.manager_id {
            changes.insert("manager_id".to_string(), json!(manager_id));
        }
        if let Some(is_active) = self.is_active {
            changes.insert("is_active".to_string(), json!(is_active));
        }
        Ok(changes)
    }
}

/// A department manager must be a user of the same tenant
async fn check_manager(state: &AppState, ctx: &TenantContext, manager_id: Option<Uuid>) -> Result<(), ApiError> {
    let Some(id) = manager_id else {
        return Ok(());
    };
    match state.contexts.repository::<User>(ctx).find(id).await {
        Ok(_) => Ok(()),
        Err(TenancyError::NotFound { .. }) => {
            Err(ApiError::validation_error(format!("Manager {} is not a user of this workspace", id), None))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/departments
pub async fn list(State(state): State<AppState>, CurrentTenant(ctx): CurrentTenant) -> ApiResult<Vec<Department>> {
    let departments = state
        .contexts
        .repository::<Department>(&ctx)
        .list(FilterData::default().order_by("name asc"))
        .await?;
    Ok(ApiResponse::success(departments))
}

/// POST /api/departments
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<DepartmentInput>, JsonRejection>,
) -> ApiResult<Department> {
    require_manager(&user)?;
    let Json(input) = payload?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation_error("Department name is required", None));
    }
    check_manager(&state, &ctx, input.manager_id).await?;

    let mut department = Department::new(name);
    department.branch_name = input.branch_name;
    department.description = input.description;
    department.manager_id = input.manager_id;

    let department = state.contexts.repository::<Department>(&ctx).create(department).await?;
    Ok(ApiResponse::created(department))
}

/// GET /api/departments/:id
pub async fn get(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Path(id): Path<Uuid>,
) -> ApiResult<Department> {
    let department = state.contexts.repository::<Department>(&ctx).find(id).await?;
    Ok(ApiResponse::success(department))
}

/// PATCH /api/departments/:id
pub async fn update(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<DepartmentPatch>, JsonRejection>,
) -> ApiResult<Department> {
    require_manager(&user)?;
    let Json(patch) = payload?;
    if let Some(manager_id) = patch.manager_id {
        check_manager(&state, &ctx, manager_id).await?;
    }
    let changes = patch.into_changes()?;

    let department = state.contexts.repository::<Department>(&ctx).update(id, changes).await?;
    Ok(ApiResponse::success(department))
}

/// DELETE /api/departments/:id
pub async fn delete(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_manager(&user)?;
    state.contexts.repository::<Department>(&ctx).delete(id).await?;
    Ok(ApiResponse::no_content())
}
