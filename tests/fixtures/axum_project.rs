// Axum service with plain, chained, nested and merged routers
use axum::{
    extract::{Path, Query},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

async fn list_users(Query(query): Query<ListQuery>) -> Json<Vec<User>> {
    Json(vec![])
}

async fn get_user(Path(id): Path<u32>) -> Json<User> {
    todo!()
}

async fn create_user(Json(payload): Json<CreateUserRequest>) -> Json<User> {
    todo!()
}

async fn update_user(Path(id): Path<u32>, Json(payload): Json<UpdateUserRequest>) -> Json<User> {
    todo!()
}

async fn delete_user(Path(id): Path<u32>) {}

async fn health_check() -> &'static str {
    "OK"
}

fn user_routes() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user))
        .route("/{id}", delete(delete_user))
}

pub fn app() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/users", user_routes())
}
