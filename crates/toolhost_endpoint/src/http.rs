use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::state::EndpointState;

pub async fn health(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let workers: Vec<_> = state
        .supervisor
        .status_snapshot()
        .await
        .into_iter()
        .map(|(namespace, status)| json!({ "namespace": namespace, "status": format!("{status:?}") }))
        .collect();
    let metrics = toolhost_protocol::METRICS.snapshot();
    Json(json!({ "status": "ok", "workers": workers, "metrics": metrics }))
}

pub async fn namespaces(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let mut synth = state.synthesiser.lock().await;
    text_response(synth.catalogue())
}

pub async fn types(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let mut synth = state.synthesiser.lock().await;
    text_response(synth.types_document())
}

pub async fn types_filtered(
    State(state): State<Arc<EndpointState>>,
    Path(list): Path<String>,
) -> impl IntoResponse {
    let only: Vec<String> = list.split(',').map(str::to_string).collect();
    let synth = state.synthesiser.lock().await;
    text_response(&synth.filtered_types_document(&only))
}

pub async fn client_module(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let mut synth = state.synthesiser.lock().await;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/javascript")
        .body(synth.client_module().to_string())
        .unwrap()
}

pub async fn openapi(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let names = {
        let synth = state.synthesiser.lock().await;
        synth.namespace_names()
    };
    let paths: serde_json::Map<String, serde_json::Value> = names
        .iter()
        .map(|name| {
            (
                format!("/rpc/{name}"),
                json!({ "post": { "summary": format!("Call a {name} function") } }),
            )
        })
        .collect();
    Json(json!({
        "openapi": "3.0.0",
        "info": { "title": "toolhost", "version": env!("CARGO_PKG_VERSION") },
        "paths": paths,
    }))
}

pub async fn doc(State(state): State<Arc<EndpointState>>) -> impl IntoResponse {
    let catalogue = {
        let mut synth = state.synthesiser.lock().await;
        synth.catalogue().to_string()
    };
    let body = format!(
        "<!doctype html><html><body><h1>toolhost</h1><pre>{}</pre></body></html>",
        html_escape(&catalogue)
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html")
        .body(body)
        .unwrap()
}

fn text_response(body: &str) -> Response<String> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body.to_string())
        .unwrap()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
