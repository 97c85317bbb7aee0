use crate::error::{ApiErrorResponse, PanelError};
use crate::upload::client::{UploadBody, UploadClient, UploadContext};
use crate::upload::result::UploadResult;
use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, header::CONTENT_LENGTH};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::path::Path;
use tracing::debug;

/// Header carrying the file name for raw uploads.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Reads the file from one named multipart field.
pub struct MultipartClient {
    name: &'static str,
    field: &'static str,
    render: fn(&UploadResult) -> Response,
    ctx: Option<UploadContext>,
    result: UploadResult,
}

impl MultipartClient {
    fn new(name: &'static str, field: &'static str, render: fn(&UploadResult) -> Response) -> Self {
        Self {
            name,
            field,
            render,
            ctx: None,
            result: UploadResult::new(),
        }
    }

    /// Generic form upload: field `file`, `{"code","info","data"}` answer.
    pub fn standard() -> Self {
        Self::new("standard", "file", standard_response)
    }

    /// editor.md image dialog: field `editormd-image-file`, `{"success","message","url"}` answer.
    pub fn editormd() -> Self {
        Self::new("editormd", "editormd-image-file", editormd_response)
    }
}

#[async_trait]
impl UploadClient for MultipartClient {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self, ctx: UploadContext, result: UploadResult) {
        self.ctx = Some(ctx);
        self.result = result;
    }

    async fn body(&mut self) -> Result<UploadBody, PanelError> {
        let ctx = self.ctx.take().ok_or(PanelError::MissingUploadFile)?;
        let limit = ctx.body_limit;
        let too_large = |status: StatusCode| status == StatusCode::PAYLOAD_TOO_LARGE;

        let mut multipart = Multipart::from_request(ctx.request, &())
            .await
            .map_err(|e| PanelError::UploadRejected(e.body_text()))?;

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => return Err(PanelError::MissingUploadFile),
                Err(e) if too_large(e.status()) => return Err(PanelError::PayloadTooLarge { limit }),
                Err(e) => return Err(e.into()),
            };
            if field.name() != Some(self.field) {
                continue;
            }
            let file_name = field.file_name().map(base_name).unwrap_or_default();
            if file_name.is_empty() {
                return Err(PanelError::MissingUploadFile);
            }

            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) if too_large(e.status()) => {
                    return Err(PanelError::PayloadTooLarge { limit });
                }
                Err(e) => return Err(e.into()),
            };
            if data.len() > limit {
                return Err(PanelError::PayloadTooLarge { limit });
            }

            debug!(client = self.name, file = %file_name, size = data.len(), "multipart file received");
            self.result.set_file(file_name, data.len() as u64);
            return Ok(UploadBody::from_bytes(data));
        }
    }

    fn result(&self) -> &UploadResult {
        &self.result
    }

    fn result_mut(&mut self) -> &mut UploadResult {
        &mut self.result
    }

    fn response(&self) -> Response {
        (self.render)(&self.result)
    }
}

/// Whole request body is the file; the name comes from `X-File-Name` or `?name=`.
#[derive(Default)]
pub struct RawClient {
    ctx: Option<UploadContext>,
    result: UploadResult,
}

impl RawClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadClient for RawClient {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn init(&mut self, ctx: UploadContext, result: UploadResult) {
        self.ctx = Some(ctx);
        self.result = result;
    }

    async fn body(&mut self) -> Result<UploadBody, PanelError> {
        let ctx = self.ctx.take().ok_or(PanelError::MissingUploadFile)?;
        let limit = ctx.body_limit;
        let (parts, body) = ctx.request.into_parts();

        let from_header = parts
            .headers
            .get(FILE_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let from_query = || {
            parts.uri.query().and_then(|qs| {
                url::form_urlencoded::parse(qs.as_bytes())
                    .find(|(k, _)| k == "name")
                    .map(|(_, v)| v.into_owned())
            })
        };
        let file_name = from_header
            .or_else(from_query)
            .map(|name| base_name(&name))
            .unwrap_or_default();
        if file_name.is_empty() {
            return Err(PanelError::MissingUploadFile);
        }

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(PanelError::PayloadTooLarge { limit });
        }

        // extensions carry the route's body limit; the explicit check covers callers without one
        let request = Request::from_parts(parts, body);
        let data = match Bytes::from_request(request, &()).await {
            Ok(data) => data,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(PanelError::PayloadTooLarge { limit });
            }
            Err(e) => return Err(PanelError::UploadRejected(e.body_text())),
        };
        if data.len() > limit {
            return Err(PanelError::PayloadTooLarge { limit });
        }

        debug!(file = %file_name, size = data.len(), "raw upload received");
        self.result.set_file(file_name, data.len() as u64);
        Ok(UploadBody::from_bytes(data))
    }

    fn result(&self) -> &UploadResult {
        &self.result
    }

    fn result_mut(&mut self) -> &mut UploadResult {
        &mut self.result
    }

    fn response(&self) -> Response {
        match self.result.error() {
            None => Json(file_json(&self.result)).into_response(),
            Some(err) => {
                let (status, error) = err.status_and_body();
                (status, Json(ApiErrorResponse { error })).into_response()
            }
        }
    }
}

/// Strip any directory part a client put in the file name.
fn base_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn file_json(r: &UploadResult) -> serde_json::Value {
    json!({
        "name": r.file_name,
        "path": r.dst_file,
        "url": r.file_url,
        "size": r.file_size,
        "type": r.file_type,
    })
}

fn standard_response(r: &UploadResult) -> Response {
    match r.error() {
        None => Json(json!({ "code": 1, "info": "", "data": file_json(r) })).into_response(),
        Some(err) => {
            let (status, body) = err.status_and_body();
            (
                status,
                Json(json!({ "code": 0, "info": body.message, "data": null })),
            )
                .into_response()
        }
    }
}

/// editor.md reads the outcome from the body only, so errors still answer 200.
fn editormd_response(r: &UploadResult) -> Response {
    match r.error() {
        None => Json(json!({ "success": 1, "message": "", "url": r.file_url })).into_response(),
        Some(err) => {
            let (_, body) = err.status_and_body();
            Json(json!({ "success": 0, "message": body.message })).into_response()
        }
    }
}
