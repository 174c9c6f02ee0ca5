//! Employee routes: CRUD over the in-memory directory. Protected by the gate.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use gatehouse_common::{
    error::{GatehouseError, GatehouseResult},
    validation::validate_request,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    AppState,
    employees::{Employee, EmployeeInput},
    middleware::AuthContext,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

/// GET /api/v1/employees
async fn list_employees(State(state): State<Arc<AppState>>) -> Json<Vec<Employee>> {
    Json(state.employees.list().await)
}

/// GET /api/v1/employees/{id}
async fn get_employee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> GatehouseResult<Json<Employee>> {
    state
        .employees
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| GatehouseError::not_found("Employee"))
}

/// POST /api/v1/employees
async fn create_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<EmployeeInput>,
) -> GatehouseResult<(StatusCode, Json<Employee>)> {
    validate_request(&body)?;

    let employee = state.employees.create(body).await;
    tracing::info!(employee_id = employee.id, actor = %auth.subject, "Employee created");

    Ok((StatusCode::CREATED, Json(employee)))
}

/// PUT /api/v1/employees/{id}
async fn update_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<u64>,
    Json(body): Json<EmployeeInput>,
) -> GatehouseResult<Json<Employee>> {
    validate_request(&body)?;

    let employee = state
        .employees
        .update(id, body)
        .await
        .ok_or_else(|| GatehouseError::not_found("Employee"))?;
    tracing::info!(employee_id = id, actor = %auth.subject, "Employee updated");

    Ok(Json(employee))
}

/// DELETE /api/v1/employees/{id}
async fn delete_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<u64>,
) -> GatehouseResult<Json<DeleteResponse>> {
    state
        .employees
        .delete(id)
        .await
        .ok_or_else(|| GatehouseError::not_found("Employee"))?;
    tracing::info!(employee_id = id, actor = %auth.subject, "Employee deleted");

    Ok(Json(DeleteResponse {
        message: format!("Deleted employee {id}"),
    }))
}
