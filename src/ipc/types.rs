use crate::error::{AppError, AppResult};
use crate::state::Workspace;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<Workspace>,
}

impl AppState {
    pub fn workspace(&self) -> AppResult<&Workspace> {
        self.workspace.as_ref().ok_or(AppError::NoWorkspace)
    }

    pub fn workspace_mut(&mut self) -> AppResult<&mut Workspace> {
        self.workspace.as_mut().ok_or(AppError::NoWorkspace)
    }
}
