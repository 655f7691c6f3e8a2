#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use hrms_tenancy::config::AppConfig;
use hrms_tenancy::database::{
    Connector, DatabaseError, MemoryConnector, MemoryStorage, Row, Storage,
};
use hrms_tenancy::filter::FilterData;
use hrms_tenancy::services::{NotifyError, ProvisionRequest, Provisioned, WelcomeMessage, WelcomeNotifier};
use hrms_tenancy::AppState;

/// In-memory application with handles on its storage for assertions
pub struct Harness {
    pub state: AppState,
    pub central: Arc<dyn Storage>,
    pub connector: Arc<MemoryConnector>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_central(Arc::new(MemoryStorage::central("hrms_central")))
    }

    pub fn with_central(central: Arc<dyn Storage>) -> Self {
        let connector = Arc::new(MemoryConnector::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(AppConfig::development(), central.clone(), connector.clone(), notifier.clone());
        Self { state, central, connector, notifier }
    }

    pub fn app(&self) -> Router {
        hrms_tenancy::app(self.state.clone())
    }

    pub async fn provision(&self, label: &str, plan: &str, admin_email: &str) -> Provisioned {
        self.state
            .provisioning
            .provision(request(label, plan, admin_email))
            .await
            .expect("provisioning failed")
    }

    pub async fn count(&self, table: &str) -> i64 {
        self.central.count(table, &FilterData::default()).await.unwrap()
    }
}

pub fn request(label: &str, plan: &str, admin_email: &str) -> ProvisionRequest {
    ProvisionRequest {
        company_name: format!("{} Ltd", label),
        domain: label.to_string(),
        plan_id: plan.to_string(),
        admin_email: admin_email.to_string(),
        admin_name: "Ann Admin".to_string(),
        payment_type: None,
    }
}

/// Keeps every welcome message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<WelcomeMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<WelcomeMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl WelcomeNotifier for RecordingNotifier {
    async fn send_welcome(&self, message: &WelcomeMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl WelcomeNotifier for FailingNotifier {
    async fn send_welcome(&self, _message: &WelcomeMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp down".into()))
    }
}

/// Memory storage that refuses inserts into one table
#[derive(Debug)]
pub struct FailingStorage {
    pub inner: MemoryStorage,
    pub fail_table: &'static str,
}

impl FailingStorage {
    pub fn central(fail_table: &'static str) -> Self {
        Self { inner: MemoryStorage::central("hrms_central"), fail_table }
    }

    fn check(&self, table: &str) -> Result<(), DatabaseError> {
        if table == self.fail_table {
            Err(DatabaseError::QueryError(format!("insert into {} failed", table)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for FailingStorage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DatabaseError> {
        self.check(table)?;
        self.inner.insert(table, row).await
    }

    async fn insert_all(&self, rows: Vec<(String, Row)>) -> Result<Vec<Row>, DatabaseError> {
        for (table, _) in &rows {
            self.check(table)?;
        }
        self.inner.insert_all(rows).await
    }

    async fn select(&self, table: &str, filter: &FilterData) -> Result<Vec<Row>, DatabaseError> {
        self.inner.select(table, filter).await
    }

    async fn count(&self, table: &str, filter: &FilterData) -> Result<i64, DatabaseError> {
        self.inner.count(table, filter).await
    }

    async fn update(&self, table: &str, filter: &FilterData, changes: Row) -> Result<Vec<Row>, DatabaseError> {
        self.inner.update(table, filter, changes).await
    }

    async fn delete(&self, table: &str, filter: &FilterData) -> Result<u64, DatabaseError> {
        self.inner.delete(table, filter).await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.inner.ping().await
    }
}

/// Connector whose databases can never be reached
#[derive(Debug, Default)]
pub struct UnreachableConnector {
    pub dropped: Mutex<Vec<String>>,
}

#[async_trait]
impl Connector for UnreachableConnector {
    async fn connect(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError> {
        Err(DatabaseError::Unavailable(database_name.to_string()))
    }

    async fn drop_database(&self, database_name: &str) -> Result<(), DatabaseError> {
        self.dropped.lock().unwrap().push(database_name.to_string());
        Ok(())
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    host: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, host);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Reply { status, headers, body }
}

pub async fn get(app: &Router, host: &str, uri: &str, token: Option<&str>) -> Reply {
    send(app, Method::GET, host, uri, token, None).await
}
