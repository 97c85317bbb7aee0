use crate::error::PanelError;
use crate::middleware::RequireKeyAuth;
use crate::router::PanelState;
use crate::upload::{UploadContext, UploadResult, Validator};
use axum::extract::{Path, Request, State};
use axum::response::Response;
use std::sync::Arc;

/// POST /upload/{client}. Unregistered client names fall back to `standard`.
pub async fn upload(
    State(state): State<PanelState>,
    _auth: RequireKeyAuth,
    Path(client): Path<String>,
    request: Request,
) -> Response {
    let ctx = UploadContext::new(request, state.upload_body_limit);
    let validator = extension_validator(state.allowed_extensions.clone());
    let mark_file = state.watermark_file.as_deref().map(|p| p.as_path());

    let client = state
        .uploader
        .upload(&client, ctx, UploadResult::new(), mark_file, Some(validator))
        .await;
    client.response()
}

/// Rejects empty files and, when `allowed` is not empty, any other extension.
fn extension_validator(allowed: Arc<[String]>) -> Validator {
    Box::new(move |r: &UploadResult| -> Result<(), PanelError> {
        if r.file_size == 0 {
            return Err(PanelError::UploadRejected(format!("`{}` is empty", r.file_name)));
        }
        let ext = r.extension();
        let ext = ext.trim_start_matches('.');
        if !allowed.is_empty() && !allowed.iter().any(|a| a == ext) {
            return Err(PanelError::UploadRejected(format!(
                "extension `{ext}` is not allowed"
            )));
        }
        Ok(())
    })
}
