//! File upload pipeline.
//!
//! Layout:
//! - `client.rs`: the `UploadClient` backend trait and the sized body it yields
//! - `clients.rs`: built-in clients (`standard`, `editormd`, `raw`)
//! - `registry.rs`: clients by name with a default fallback
//! - `result.rs`: per-upload state and destination naming
//! - `storer.rs`: storage strategies
//! - `watermark.rs`: image watermarking

pub mod client;
pub mod clients;
pub mod registry;
pub mod result;
pub mod storer;
pub mod watermark;

pub use client::{UploadBody, UploadClient, UploadContext};
pub use registry::ClientRegistry;
pub use result::{FileType, UploadResult};
pub use storer::{LocalStorer, StoredFile, Storer};
pub use watermark::{OverlayWatermarker, Watermarker};

use crate::error::PanelError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Caller-supplied check run once the file has been read, before anything is stored.
pub type Validator = Box<dyn FnOnce(&UploadResult) -> Result<(), PanelError> + Send>;

/// Everything an upload needs besides the request itself.
#[derive(Clone)]
pub struct UploadPipeline {
    registry: Arc<ClientRegistry>,
    storer: Arc<dyn Storer>,
    watermarker: Arc<dyn Watermarker>,
}

impl UploadPipeline {
    pub fn new(
        registry: Arc<ClientRegistry>,
        storer: Arc<dyn Storer>,
        watermarker: Arc<dyn Watermarker>,
    ) -> Self {
        Self {
            registry,
            storer,
            watermarker,
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Run one upload through the client registered as `client_name`.
    ///
    /// The returned client carries the outcome: on failure the first error is
    /// attached to its result and nothing after the failing step ran.
    pub async fn upload(
        &self,
        client_name: &str,
        ctx: UploadContext,
        result: UploadResult,
        mark_file: Option<&Path>,
        validator: Option<Validator>,
    ) -> Box<dyn UploadClient> {
        let mut client = self.registry.get(client_name);
        client.init(ctx, result);

        match self.run(client.as_mut(), mark_file, validator).await {
            Ok(()) => info!(
                client = client.name(),
                file = %client.result().file_name,
                url = %client.result().file_url,
                "upload stored"
            ),
            Err(e) => {
                warn!(client = client.name(), error = %e, "upload failed");
                client.set_error(e);
            }
        }
        client
    }

    async fn run(
        &self,
        client: &mut dyn UploadClient,
        mark_file: Option<&Path>,
        validator: Option<Validator>,
    ) -> Result<(), PanelError> {
        let mut body = client.body().await?;

        if let Some(validate) = validator {
            validate(client.result())?;
        }

        let dst_file = client.result_mut().gen_file_name()?;
        let result = client.result();

        let ext = result.extension();
        let stored = match mark_file {
            Some(mark)
                if result.file_type == FileType::Image && self.watermarker.supports(&ext) =>
            {
                debug!(dst_file = %dst_file, mark = %mark.display(), "watermarking image");
                let marked = self
                    .watermark(body.read_all().await?, ext, mark.to_path_buf())
                    .await?;
                let mut marked = UploadBody::from_bytes(marked);
                let size = marked.size();
                self.storer.put(&dst_file, marked.reader(), size).await?
            }
            _ => {
                let size = body.size();
                self.storer.put(&dst_file, body.reader(), size).await?
            }
        };

        let result = client.result_mut();
        result.save_path = stored.save_path;
        result.file_url = stored.file_url;
        Ok(())
    }

    /// Image decoding and encoding is CPU bound; keep it off the async workers.
    async fn watermark(
        &self,
        bytes: Vec<u8>,
        ext: String,
        mark: PathBuf,
    ) -> Result<Vec<u8>, PanelError> {
        let watermarker = self.watermarker.clone();
        tokio::task::spawn_blocking(move || watermarker.apply(&bytes, &ext, &mark)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncRead, AsyncReadExt};

    #[derive(Default)]
    struct MemoryStorer {
        puts: Mutex<Vec<(String, Vec<u8>, u64)>>,
    }

    #[async_trait]
    impl Storer for MemoryStorer {
        async fn put(
            &self,
            dst_file: &str,
            body: &mut (dyn AsyncRead + Send + Unpin),
            size: u64,
        ) -> Result<StoredFile, PanelError> {
            let mut buf = Vec::new();
            body.read_to_end(&mut buf).await?;
            self.puts
                .lock()
                .unwrap()
                .push((dst_file.to_string(), buf, size));
            Ok(StoredFile {
                save_path: format!("/mem/{dst_file}"),
                file_url: format!("mem://{dst_file}"),
            })
        }
    }

    /// Reverses the bytes so a marked payload is easy to recognise.
    #[derive(Default)]
    struct ReversingWatermarker {
        calls: AtomicUsize,
    }

    impl Watermarker for ReversingWatermarker {
        fn supports(&self, ext: &str) -> bool {
            ext != ".svg"
        }

        fn apply(&self, bytes: &[u8], _ext: &str, _mark: &Path) -> Result<Vec<u8>, PanelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(bytes.iter().rev().copied().collect())
        }
    }

    struct Harness {
        pipeline: UploadPipeline,
        storer: Arc<MemoryStorer>,
        watermarker: Arc<ReversingWatermarker>,
    }

    fn harness() -> Harness {
        let storer = Arc::new(MemoryStorer::default());
        let watermarker = Arc::new(ReversingWatermarker::default());
        let pipeline = UploadPipeline::new(
            Arc::new(ClientRegistry::builtin()),
            storer.clone(),
            watermarker.clone(),
        );
        Harness {
            pipeline,
            storer,
            watermarker,
        }
    }

    fn raw(name: &str, content: &'static [u8]) -> UploadContext {
        let req = Request::builder()
            .method("POST")
            .uri("/upload/raw")
            .header(clients::FILE_NAME_HEADER, name)
            .body(Body::from(content))
            .unwrap();
        UploadContext::new(req, 1024)
    }

    #[tokio::test]
    async fn non_images_reach_storage_unmodified() {
        let h = harness();
        let mark = Path::new("mark.png");

        let client = h
            .pipeline
            .upload("raw", raw("dump.sql", b"select 1;"), UploadResult::new(), Some(mark), None)
            .await;

        assert!(client.result().is_ok());
        let puts = h.storer.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].1, b"select 1;");
        assert_eq!(puts[0].2, 9);
        assert!(puts[0].0.ends_with(".sql"));
        assert_eq!(h.watermarker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.result().file_url, format!("mem://{}", puts[0].0));
    }

    #[tokio::test]
    async fn images_without_mark_file_are_not_watermarked() {
        let h = harness();
        let client = h
            .pipeline
            .upload("raw", raw("pic.png", b"\x89PNG"), UploadResult::new(), None, None)
            .await;

        assert!(client.result().is_ok());
        assert_eq!(h.storer.puts.lock().unwrap()[0].1, b"\x89PNG");
        assert_eq!(h.watermarker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn images_with_mark_file_are_watermarked() {
        let h = harness();
        let client = h
            .pipeline
            .upload(
                "raw",
                raw("pic.PNG", b"abc"),
                UploadResult::new(),
                Some(Path::new("mark.png")),
                None,
            )
            .await;

        assert!(client.result().is_ok());
        assert_eq!(client.result().file_type, FileType::Image);
        let puts = h.storer.puts.lock().unwrap();
        assert_eq!(puts[0].1, b"cba");
        assert_eq!(puts[0].2, 3);
        assert_eq!(h.watermarker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn images_the_watermarker_cannot_handle_are_stored_as_is() {
        let h = harness();
        let client = h
            .pipeline
            .upload(
                "raw",
                raw("logo.svg", b"<svg/>"),
                UploadResult::new(),
                Some(Path::new("mark.png")),
                None,
            )
            .await;

        assert!(client.result().is_ok());
        assert_eq!(client.result().file_type, FileType::Image);
        assert_eq!(h.storer.puts.lock().unwrap()[0].1, b"<svg/>");
        assert_eq!(h.watermarker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validator_failure_skips_storage() {
        let h = harness();
        let validator: Validator = Box::new(|r: &UploadResult| -> Result<(), PanelError> {
            Err(PanelError::UploadRejected(format!("{} not allowed", r.file_name)))
        });

        let client = h
            .pipeline
            .upload("raw", raw("run.exe", b"MZ"), UploadResult::new(), None, Some(validator))
            .await;

        assert!(matches!(
            client.result().error(),
            Some(PanelError::UploadRejected(_))
        ));
        assert!(h.storer.puts.lock().unwrap().is_empty());
        assert!(client.result().dst_file.is_empty());
    }

    #[tokio::test]
    async fn validator_sees_the_file_details() {
        let h = harness();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let validator: Validator = Box::new(move |r: &UploadResult| -> Result<(), PanelError> {
            *sink.lock().unwrap() = Some((r.file_name.clone(), r.file_size));
            Ok(())
        });

        h.pipeline
            .upload("raw", raw("a.txt", b"hello"), UploadResult::new(), None, Some(validator))
            .await;

        assert_eq!(*seen.lock().unwrap(), Some(("a.txt".to_string(), 5)));
        assert_eq!(h.storer.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn body_failure_short_circuits() {
        let h = harness();
        let req = Request::builder()
            .method("POST")
            .uri("/upload/raw")
            .body(Body::from("no name"))
            .unwrap();

        let client = h
            .pipeline
            .upload("raw", UploadContext::new(req, 1024), UploadResult::new(), None, None)
            .await;

        assert!(matches!(
            client.result().error(),
            Some(PanelError::MissingUploadFile)
        ));
        assert!(h.storer.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_client_uses_the_default() {
        let h = harness();
        let client = h
            .pipeline
            .upload("dropzone", raw("a.txt", b"x"), UploadResult::new(), None, None)
            .await;

        assert_eq!(client.name(), "standard");
        // not a multipart request, so the default client rejects it
        assert!(!client.result().is_ok());
        assert!(h.storer.puts.lock().unwrap().is_empty());
    }
}
