use crate::backup;
use crate::error::{AppError, AppResult};
use crate::ipc::error::respond;
use crate::ipc::params::get_required_path;
use crate::ipc::types::{AppState, Request};
use crate::state::Workspace;
use serde_json::json;
use tracing::{info, warn};

fn handle_export(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let out_path = get_required_path(params, "outPath")?;
    let ws = state.workspace()?;
    let manifest = backup::export_bundle(&ws.path, &out_path)?;
    info!(path = %out_path.display(), sha256 = %manifest.db_sha256, "workspace bundle exported");
    Ok(json!({ "path": out_path.to_string_lossy(), "manifest": manifest }))
}

/// Imports into the selected workspace and reopens it.
fn handle_import(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let in_path = get_required_path(params, "inPath")?;
    let path = state.workspace()?.path.clone();

    // The connection must be closed before the database file is replaced.
    state.workspace = None;
    let imported = backup::import_bundle(&in_path, &path);
    let reopened = Workspace::open(&path).map_err(AppError::Io)?;
    state.workspace = Some(reopened);

    let manifest = imported.map_err(|e| {
        let reason = format!("{e:#}");
        warn!(error = %reason, path = %in_path.display(), "bundle import rejected");
        AppError::Io(e)
    })?;
    info!(path = %in_path.display(), "workspace bundle imported");
    Ok(json!({ "manifest": manifest }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "backup.exportWorkspace" => handle_export(state, &req.params),
        "backup.importWorkspace" => handle_import(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
