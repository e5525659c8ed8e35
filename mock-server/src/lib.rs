use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};

/// Behaviour of the mock server.
#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Exact `Authorization` header value every request must carry.
    pub authorization: String,
    /// Projects that exist; anything else answers 404.
    pub projects: Vec<String>,
    /// Reported by `service-api-info`.
    pub api_version: i64,
}

impl Default for MockConfig {
    /// User `admin`, password `secret`, one project `demo`.
    fn default() -> Self {
        Self {
            authorization: "Basic YWRtaW46c2VjcmV0".to_string(),
            projects: vec!["demo".to_string()],
            api_version: 7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub name: String,
    pub description: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

/// One accepted upload, as received.
#[derive(Clone, Debug, Serialize)]
pub struct RecordedUpload {
    /// `None` for global services.
    pub project: Option<String>,
    pub service: String,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub config: MockConfig,
    pub uploads: Vec<RecordedUpload>,
    pub baselines: HashMap<String, BTreeMap<String, Baseline>>,
    /// Project lists passed to `update-findings-schema`.
    pub schema_updates: Vec<String>,
}

pub type Db = Arc<RwLock<ServerState>>;

pub fn new_db(config: MockConfig) -> Db {
    Arc::new(RwLock::new(ServerState {
        config,
        ..ServerState::default()
    }))
}

pub fn app(db: Db) -> Router {
    Router::new()
        .route("/service-api-info/", get(api_info))
        .route("/p/{project}/add-external-findings/", put(add_external_findings))
        .route("/p/{project}/add-external-metrics/", put(add_external_metrics))
        .route("/p/{project}/add-none-code-metrics/", put(add_non_code_metrics))
        .route("/p/{project}/external-report/", post(external_report))
        .route("/p/{project}/architecture-upload/", post(architecture_upload))
        .route("/p/{project}/baselines/", get(list_baselines))
        .route(
            "/p/{project}/baselines/{name}",
            put(put_baseline).delete(delete_baseline),
        )
        .route("/add-external-findings-group/", put(add_findings_group))
        .route(
            "/add-external-finding-descriptions/",
            put(add_finding_descriptions),
        )
        .route(
            "/add-external-metric-description/",
            put(add_metric_descriptions),
        )
        .route("/update-findings-schema/", get(update_findings_schema))
        .layer(middleware::from_fn_with_state(db.clone(), require_basic_auth))
        .with_state(db)
}

pub async fn run(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app(db)).await
}

type Params = Query<HashMap<String, String>>;

async fn require_basic_auth(State(db): State<Db>, request: Request, next: Next) -> Response {
    let expected = db.read().await.config.authorization.clone();
    let given = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if given != Some(expected.as_str()) {
        warn!(uri = %request.uri(), "rejected unauthenticated request");
        return (StatusCode::UNAUTHORIZED, "authentication required").into_response();
    }
    next.run(request).await
}

async fn ensure_project(db: &Db, project: &str) -> Result<(), (StatusCode, String)> {
    if db.read().await.config.projects.iter().any(|p| p == project) {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, format!("project {project} not found")))
    }
}

fn parse_json(body: &str) -> Result<serde_json::Value, (StatusCode, String)> {
    serde_json::from_str(body).map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid json: {e}")))
}

fn require_params(query: &HashMap<String, String>, names: &[&str]) -> Result<(), (StatusCode, String)> {
    match names.iter().find(|name| !query.contains_key(**name)) {
        Some(missing) => Err((StatusCode::BAD_REQUEST, format!("missing parameter {missing}"))),
        None => Ok(()),
    }
}

/// Accepts `"{ms}"` or `"{branch}:{ms}"`.
fn valid_timestamp(value: &str) -> bool {
    let millis = value.rsplit(':').next().unwrap_or(value);
    millis.parse::<i64>().is_ok()
}

async fn record(db: &Db, upload: RecordedUpload) {
    info!(
        service = %upload.service,
        project = ?upload.project,
        files = upload.files.len(),
        "accepted upload"
    );
    db.write().await.uploads.push(upload);
}

async fn api_info(State(db): State<Db>) -> Json<serde_json::Value> {
    let version = db.read().await.config.api_version;
    Json(serde_json::json!({ "apiVersion": version }))
}

async fn external_data(
    db: Db,
    service: &str,
    project: String,
    query: HashMap<String, String>,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    ensure_project(&db, &project).await?;
    require_params(
        &query,
        &["t", "message", "partition", "skip-session", "adjusttimestamp"],
    )?;
    if !valid_timestamp(&query["t"]) {
        return Err((StatusCode::BAD_REQUEST, "invalid timestamp".to_string()));
    }
    let body = parse_json(&body)?;
    if !body.is_array() {
        return Err((StatusCode::BAD_REQUEST, "expected a list".to_string()));
    }
    record(
        &db,
        RecordedUpload {
            project: Some(project),
            service: service.to_string(),
            query,
            body: Some(body),
            files: Vec::new(),
        },
    )
    .await;
    Ok("success")
}

async fn add_external_findings(
    State(db): State<Db>,
    Path(project): Path<String>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    external_data(db, "add-external-findings", project, query, body).await
}

async fn add_external_metrics(
    State(db): State<Db>,
    Path(project): Path<String>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    external_data(db, "add-external-metrics", project, query, body).await
}

async fn add_non_code_metrics(
    State(db): State<Db>,
    Path(project): Path<String>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    external_data(db, "add-none-code-metrics", project, query, body).await
}

async fn collect_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, (StatusCode, String)> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        (StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}"))
    };
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content = field.bytes().await.map_err(bad_request)?.to_vec();
        files.push(UploadedFile {
            field: name,
            file_name,
            content,
        });
    }
    if files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no files attached".to_string()));
    }
    Ok(files)
}

async fn external_report(
    State(db): State<Db>,
    Path(project): Path<String>,
    Query(query): Params,
    multipart: Multipart,
) -> Result<&'static str, (StatusCode, String)> {
    // Drain the body first so rejections never cut off an upload mid-stream.
    let files = collect_files(multipart).await?;
    ensure_project(&db, &project).await?;
    require_params(
        &query,
        &["t", "message", "partition", "format", "adjusttimestamp"],
    )?;
    if files.iter().any(|f| f.field != "report") {
        return Err((StatusCode::BAD_REQUEST, "reports must use field 'report'".to_string()));
    }
    record(
        &db,
        RecordedUpload {
            project: Some(project),
            service: "external-report".to_string(),
            query,
            body: None,
            files,
        },
    )
    .await;
    Ok("success")
}

async fn architecture_upload(
    State(db): State<Db>,
    Path(project): Path<String>,
    Query(query): Params,
    multipart: Multipart,
) -> Result<&'static str, (StatusCode, String)> {
    let files = collect_files(multipart).await?;
    ensure_project(&db, &project).await?;
    require_params(&query, &["t", "message"])?;
    record(
        &db,
        RecordedUpload {
            project: Some(project),
            service: "architecture-upload".to_string(),
            query,
            body: None,
            files,
        },
    )
    .await;
    Ok("success")
}

async fn list_baselines(
    State(db): State<Db>,
    Path(project): Path<String>,
) -> Result<Json<Vec<Baseline>>, (StatusCode, String)> {
    ensure_project(&db, &project).await?;
    let state = db.read().await;
    let baselines = state
        .baselines
        .get(&project)
        .map(|b| b.values().cloned().collect())
        .unwrap_or_default();
    Ok(Json(baselines))
}

async fn put_baseline(
    State(db): State<Db>,
    Path((project, name)): Path<(String, String)>,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    ensure_project(&db, &project).await?;
    let baseline: Baseline = serde_json::from_str(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid baseline: {e}")))?;
    if baseline.name != name {
        return Err((StatusCode::BAD_REQUEST, "baseline name does not match url".to_string()));
    }
    info!(%project, %name, "stored baseline");
    db.write()
        .await
        .baselines
        .entry(project)
        .or_default()
        .insert(name, baseline);
    Ok("success")
}

async fn delete_baseline(
    State(db): State<Db>,
    Path((project, name)): Path<(String, String)>,
) -> Result<&'static str, (StatusCode, String)> {
    ensure_project(&db, &project).await?;
    let removed = db
        .write()
        .await
        .baselines
        .get_mut(&project)
        .and_then(|b| b.remove(&name));
    match removed {
        Some(_) => {
            info!(%project, %name, "deleted baseline");
            Ok("success")
        }
        None => Err((StatusCode::NOT_FOUND, format!("baseline {name} not found"))),
    }
}

async fn global_json(
    db: Db,
    service: &str,
    query: HashMap<String, String>,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    let body = parse_json(&body)?;
    record(
        &db,
        RecordedUpload {
            project: None,
            service: service.to_string(),
            query,
            body: Some(body),
            files: Vec::new(),
        },
    )
    .await;
    Ok("success")
}

async fn add_findings_group(
    State(db): State<Db>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    global_json(db, "add-external-findings-group", query, body).await
}

async fn add_finding_descriptions(
    State(db): State<Db>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    global_json(db, "add-external-finding-descriptions", query, body).await
}

async fn add_metric_descriptions(
    State(db): State<Db>,
    Query(query): Params,
    body: String,
) -> Result<&'static str, (StatusCode, String)> {
    global_json(db, "add-external-metric-description", query, body).await
}

async fn update_findings_schema(
    State(db): State<Db>,
    Query(query): Params,
) -> Result<&'static str, (StatusCode, String)> {
    require_params(&query, &["projects"])?;
    db.write().await.schema_updates.push(query["projects"].clone());
    Ok("success")
}
