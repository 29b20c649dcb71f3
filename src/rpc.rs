//! [`RecordSource`] over Odoo's `/jsonrpc` endpoint.
//!
//! Every request is a `call` to one of two services: `common` (`login`,
//! `version`) and `object` (`execute_kw`). Faults returned by the server
//! become [`RetrievalError::Remote`] so the pipeline can skip the model.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::config::ConnectionConfig;
use crate::contract::{FieldDescriptor, RecordSource, SearchQuery};
use crate::error::RetrievalError;
use crate::record::Record;
use crate::registry::IdentifierEntry;

/// Attributes requested from `fields_get`; everything else is noise.
const FIELD_ATTRIBUTES: [&str; 8] = [
    "type", "relation", "string", "required", "readonly", "store", "related", "depends",
];

const IDENTIFIER_FIELDS: [&str; 5] = ["res_id", "noupdate", "name", "module", "model"];

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    message: String,
    #[serde(default)]
    data: Option<RpcFaultData>,
}

#[derive(Deserialize)]
struct RpcFaultData {
    #[serde(default)]
    message: String,
}

impl RpcFault {
    fn describe(&self) -> String {
        match &self.data {
            Some(data) if !data.message.is_empty() => format!("{}: {}", self.message, data.message),
            _ => self.message.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ServerVersion {
    server_serie: String,
}

#[derive(Deserialize)]
struct CatalogRow {
    #[serde(default)]
    res_id: Value,
    #[serde(default)]
    noupdate: bool,
    name: String,
    module: String,
    model: String,
}

/// Authenticated JSON-RPC session.
pub struct JsonRpcSource {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    password: String,
    uid: i64,
    next_id: AtomicU64,
}

impl JsonRpcSource {
    /// Logs in and returns a session bound to the resulting user id.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, RetrievalError> {
        let mut source = Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/jsonrpc", config.url.trim_end_matches('/')),
            database: config.database.clone(),
            password: config.password.clone(),
            uid: 0,
            next_id: AtomicU64::new(1),
        };
        info!(url = %config.url, database = %config.database, user = %config.user, "[RPC] Logging in");

        let uid: Value = source
            .call(
                "common",
                "login",
                json!([config.database, config.user, config.password]),
                "common.login",
            )
            .await?;
        source.uid = uid.as_i64().ok_or_else(|| {
            error!(user = %config.user, database = %config.database, "[RPC] Login refused");
            RetrievalError::Login {
                user: config.user.clone(),
                database: config.database.clone(),
            }
        })?;
        info!(uid = source.uid, "[RPC] Logged in");
        Ok(source)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        method: &str,
        args: Value,
        context: &str,
    ) -> Result<T, RetrievalError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });
        debug!(service = %service, method = %method, request_id = id, "[RPC] Calling");

        let transport = |e: reqwest::Error| RetrievalError::Transport {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let decoded: RpcResponse<T> = response.json().await.map_err(|e| RetrievalError::Decode {
            model: context.to_string(),
            message: e.to_string(),
        })?;

        if let Some(fault) = decoded.error {
            return Err(RetrievalError::Remote {
                model: context.to_string(),
                message: fault.describe(),
            });
        }
        decoded.result.ok_or_else(|| RetrievalError::Decode {
            model: context.to_string(),
            message: "response carries neither result nor error".to_string(),
        })
    }

    async fn execute_kw<T: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<T, RetrievalError> {
        self.call(
            "object",
            "execute_kw",
            json!([self.database, self.uid, self.password, model, method, args, kwargs]),
            model,
        )
        .await
    }
}

#[async_trait]
impl RecordSource for JsonRpcSource {
    async fn search_read(
        &self,
        model: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Record>, RetrievalError> {
        let mut kwargs = json!({ "fields": query.fields });
        if let Some(order) = &query.order {
            kwargs["order"] = json!(order);
        }
        let rows: Vec<IndexMap<String, Value>> = self
            .execute_kw(model, "search_read", json!([query.domain]), kwargs)
            .await?;
        debug!(model = %model, count = rows.len(), "[RPC] search_read");
        Ok(rows.into_iter().map(Record::new).collect())
    }

    async fn fields_get(
        &self,
        model: &str,
    ) -> Result<IndexMap<String, FieldDescriptor>, RetrievalError> {
        self.execute_kw(model, "fields_get", json!([]), json!({ "attributes": FIELD_ATTRIBUTES }))
            .await
    }

    async fn default_get(
        &self,
        model: &str,
        fields: &[String],
    ) -> Result<IndexMap<String, Value>, RetrievalError> {
        self.execute_kw(model, "default_get", json!([fields]), json!({})).await
    }

    async fn identifiers(&self) -> Result<Vec<IdentifierEntry>, RetrievalError> {
        let rows: Vec<CatalogRow> = self
            .execute_kw(
                "ir.model.data",
                "search_read",
                json!([[]]),
                json!({ "fields": IDENTIFIER_FIELDS, "order": "model, id desc" }),
            )
            .await?;
        let total = rows.len();
        let entries: Vec<IdentifierEntry> = rows
            .into_iter()
            .filter_map(|row| {
                row.res_id.as_i64().map(|res_id| IdentifierEntry {
                    module: row.module,
                    name: row.name,
                    model: row.model,
                    res_id,
                    noupdate: row.noupdate,
                })
            })
            .collect();
        info!(loaded = total, usable = entries.len(), "[RPC] Identifier catalog loaded");
        Ok(entries)
    }

    async fn server_version(&self) -> Result<String, RetrievalError> {
        let version: ServerVersion = self.call("common", "version", json!([]), "common.version").await?;
        Ok(version.server_serie)
    }
}
