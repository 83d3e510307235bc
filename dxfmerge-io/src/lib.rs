use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dxfmerge_core::Document;
use tempfile::NamedTempFile;
use thiserror::Error;

mod reader;
mod writer;

use reader::DxfParser;

/// 二进制 DXF 的文件头标记。
const BINARY_SENTINEL: &str = "AutoCAD Binary DXF";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

/// 按路径读取一份文档。
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

/// 把文档写到指定路径。实现必须保证失败时不留下半写的目标文件。
pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// ASCII DXF 读写门面。
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 从内存中的 DXF 文本解析文档。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        if source.starts_with(BINARY_SENTINEL) {
            return Err(IoError::UnsupportedFeature("binary DXF".to_string()));
        }
        DxfParser::new(source).parse().map_err(|err| match err {
            reader::DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }

    /// 把文档序列化为 ASCII DXF 文本。
    pub fn to_dxf_string(&self, document: &Document) -> String {
        writer::write_document(document)
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.starts_with(BINARY_SENTINEL.as_bytes()) {
            return Err(IoError::UnsupportedFeature(format!(
                "binary DXF is not supported: {}",
                path.display()
            )));
        }
        let data = String::from_utf8(bytes).map_err(|err| IoError::ReadError {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })?;
        let document = self.parse_str(&data)?;
        tracing::debug!(
            path = %path.display(),
            entities = document.entity_count(),
            groups = document.groups().len(),
            layers = document.layers().len(),
            "DXF 读取完成"
        );
        Ok(document)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let contents = self.to_dxf_string(document);
        let write_error = |source: std::io::Error| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(parent).map_err(write_error)?;
        staging
            .write_all(contents.as_bytes())
            .and_then(|()| staging.flush())
            .map_err(write_error)?;
        staging
            .persist(path)
            .map_err(|err| write_error(err.error))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "DXF 写出完成");
        Ok(())
    }
}
