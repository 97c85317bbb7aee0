use crate::error::PanelError;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Coarse file category derived from the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Archive,
    Document,
    #[default]
    Other,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "ico" | "svg" => FileType::Image,
            "mp4" | "webm" | "mov" | "avi" | "mkv" | "flv" => FileType::Video,
            "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" => FileType::Audio,
            "zip" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "7z" | "rar" => FileType::Archive,
            "pdf" | "txt" | "md" | "csv" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            | "sql" | "json" => FileType::Document,
            _ => FileType::Other,
        }
    }

    pub fn from_file_name(name: &str) -> Self {
        Self::from_extension(&extension_of(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Archive => "archive",
            FileType::Document => "document",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension including the leading dot, or empty.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub type FileNameGenerator = Arc<dyn Fn(&UploadResult) -> Result<String, PanelError> + Send + Sync>;

/// State of one upload, filled in as the pipeline progresses.
#[derive(Default)]
pub struct UploadResult {
    /// Name the client sent the file under.
    pub file_name: String,
    pub file_size: u64,
    pub file_type: FileType,
    /// Destination name handed to the storer.
    pub dst_file: String,
    pub save_path: String,
    pub file_url: String,
    error: Option<PanelError>,
    name_generator: Option<FileNameGenerator>,
}

impl UploadResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_generator(mut self, generator: FileNameGenerator) -> Self {
        self.name_generator = Some(generator);
        self
    }

    /// Record what the client sent. The file type follows from the name.
    pub fn set_file(&mut self, file_name: impl Into<String>, file_size: u64) {
        self.file_name = file_name.into();
        self.file_size = file_size;
        self.file_type = FileType::from_file_name(&self.file_name);
    }

    pub fn extension(&self) -> String {
        extension_of(&self.file_name)
    }

    /// Compute and remember the destination name.
    pub fn gen_file_name(&mut self) -> Result<String, PanelError> {
        let name = match &self.name_generator {
            Some(generator) => generator(self)?,
            None => default_file_name(self),
        };
        if name.is_empty() {
            return Err(PanelError::UploadRejected("empty destination name".into()));
        }
        self.dst_file = name.clone();
        Ok(name)
    }

    /// Attach the terminal error. Only the first one is kept.
    pub fn set_error(&mut self, err: PanelError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn error(&self) -> Option<&PanelError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Debug for UploadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadResult")
            .field("file_name", &self.file_name)
            .field("file_size", &self.file_size)
            .field("file_type", &self.file_type)
            .field("dst_file", &self.dst_file)
            .field("save_path", &self.save_path)
            .field("file_url", &self.file_url)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// `<yyyy>/<mm>/<uuid><.ext>`
fn default_file_name(result: &UploadResult) -> String {
    format!(
        "{}/{}{}",
        Utc::now().format("%Y/%m"),
        Uuid::new_v4().simple(),
        result.extension()
    )
}
