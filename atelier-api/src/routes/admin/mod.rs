/// Administration area
///
/// Every route here sits behind both `jwt_auth_layer` and `admin_guard`.
///
/// - `dashboard`: global counts
/// - `users`: account management
/// - `documents`: deposits for users and the overview of user documents
/// - `projects`: portfolio and gallery management

pub mod documents;
pub mod projects;
pub mod users;

use crate::{app::AppState, error::ApiResult};
use atelier_shared::models::{
    admin_document::AdminDocument, document::Document, project::Project, user::User,
};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub users: i64,
    pub user_documents: i64,
    pub deposited_documents: i64,
    pub projects: i64,
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<AdminDashboard>> {
    Ok(Json(AdminDashboard {
        users: User::count(&state.db).await?,
        user_documents: Document::count(&state.db).await?,
        deposited_documents: AdminDocument::count(&state.db).await?,
        projects: Project::count(&state.db).await?,
    }))
}
