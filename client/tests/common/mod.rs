//! In-memory task API served over HTTP for end-to-end tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::Utc;
use client::ClientConfig;
use shared::{CreateTaskRequest, Task, TaskId, TaskStatus, UpdateTaskRequest};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct AppState {
    tasks: Arc<Mutex<Vec<Task>>>,
    fail_create: Arc<AtomicBool>,
}

pub struct FakeServer {
    pub config: ClientConfig,
    state: AppState,
}

impl FakeServer {
    pub fn tasks(&self) -> Vec<Task> {
        self.state.tasks.lock().unwrap().clone()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state.fail_create.store(fail, Ordering::SeqCst);
    }
}

pub async fn spawn() -> FakeServer {
    let state = AppState::default();

    let app = Router::new()
        .route("/api/tasks", get(get_tasks).post(create_task))
        .route("/api/tasks/:id", put(update_task).delete(delete_task))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ClientConfig::new(&format!("http://{addr}/api")).unwrap();
    FakeServer { config, state }
}

async fn get_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    Json(state.tasks.lock().unwrap().clone())
}

async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    if state.fail_create.load(Ordering::SeqCst) {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Erro interno".to_string()));
    }

    let now = Utc::now();
    let task = Task {
        id: TaskId::from(Uuid::new_v4().to_string()),
        title: payload.title,
        description: payload.description,
        due_date: payload.due_date,
        status: TaskStatus::Pending,
        created_at: Some(now),
        updated_at: Some(now),
    };
    state.tasks.lock().unwrap().push(task.clone());

    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, StatusCode> {
    let mut tasks = state.tasks.lock().unwrap();
    let task = tasks
        .iter_mut()
        .find(|t| t.id.as_str() == id)
        .ok_or(StatusCode::NOT_FOUND)?;

    task.apply_update(&payload);
    task.updated_at = Some(Utc::now());

    Ok(Json(task.clone()))
}

async fn delete_task(Path(id): Path<String>, State(state): State<AppState>) -> StatusCode {
    let mut tasks = state.tasks.lock().unwrap();
    let before = tasks.len();
    tasks.retain(|t| t.id.as_str() != id);

    if tasks.len() < before {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
