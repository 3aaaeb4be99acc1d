use super::handlers;
use super::types::{AppState, Request};
use crate::error::AppError;
use crate::ipc::error::{app_err, err};

/// Methods that work before a workspace is selected.
const SESSIONLESS: &[&str] = &["health", "workspace.select", "calendar.sessionDates"];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if state.workspace.is_none() && !SESSIONLESS.contains(&req.method.as_str()) {
        return app_err(&req.id, &AppError::NoWorkspace);
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::classes::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::holidays::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::earnings::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
