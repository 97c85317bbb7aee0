use crate::error::PanelError;
use crate::upload::result::UploadResult;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::Request;
use axum::response::Response;
use std::io::Cursor;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The inbound request an upload client reads from.
pub struct UploadContext {
    pub request: Request,
    /// Largest accepted file, in bytes.
    pub body_limit: usize,
}

impl UploadContext {
    pub fn new(request: Request, body_limit: usize) -> Self {
        Self {
            request,
            body_limit,
        }
    }
}

/// A readable upload payload of known size.
pub struct UploadBody {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    size: u64,
}

impl UploadBody {
    pub fn new(reader: impl AsyncRead + Send + 'static, size: u64) -> Self {
        Self {
            reader: Box::pin(reader),
            size,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::new(Cursor::new(bytes), size)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        &mut self.reader
    }

    pub async fn read_all(mut self) -> Result<Vec<u8>, PanelError> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// An upload backend: knows where a given frontend puts the file in the
/// request and how that frontend expects the answer to look.
#[async_trait]
pub trait UploadClient: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, ctx: UploadContext, result: UploadResult);

    /// Extract the file, recording its name and size on the result.
    async fn body(&mut self) -> Result<UploadBody, PanelError>;

    fn result(&self) -> &UploadResult;

    fn result_mut(&mut self) -> &mut UploadResult;

    fn set_error(&mut self, err: PanelError) {
        self.result_mut().set_error(err);
    }

    fn response(&self) -> Response;
}
