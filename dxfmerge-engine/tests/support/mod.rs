//! 合并驱动测试用的内存编解码器与文档构造工具。
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use dxfmerge_core::geometry::Point3;
use dxfmerge_core::{Document, Entity, LayerDef};
use dxfmerge_io::{DocumentLoader, DocumentSaver, IoError};

/// 按路径返回预先登记的文档；未登记的路径视为损坏文件。
#[derive(Default)]
pub struct MemoryLoader {
    documents: HashMap<PathBuf, Document>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, document: Document) -> Self {
        self.documents.insert(path.into(), document);
        self
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| IoError::InvalidDocument(format!("{} is corrupt", path.display())))
    }
}

/// 记录每次写出的文档。克隆得到的句柄共享同一份记录。
#[derive(Clone, Default)]
pub struct MemorySaver {
    saved: Rc<RefCell<Vec<(PathBuf, Document)>>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saved.borrow().len()
    }

    pub fn last(&self) -> Option<(PathBuf, Document)> {
        self.saved.borrow().last().cloned()
    }
}

impl DocumentSaver for MemorySaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        self.saved
            .borrow_mut()
            .push((path.to_path_buf(), document.clone()));
        Ok(())
    }
}

pub struct FailingSaver;

impl DocumentSaver for FailingSaver {
    fn save(&self, _document: &Document, path: &Path) -> Result<(), IoError> {
        Err(IoError::WriteError {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

/// 在图层 `layer`（颜色 `color`）上放置 `count` 个圆，圆心 X 依次为 `x0, x0 + 1, ...`。
pub fn doc_with_circles(layer: &str, color: i16, count: usize, x0: f64) -> Document {
    let mut doc = Document::new();
    doc.layers_mut()
        .insert_if_absent(LayerDef::new(layer).with_color(color))
        .expect("测试图层名合法");
    for index in 0..count {
        doc.add_entity(Entity::circle(
            layer,
            Point3::new(x0 + index as f64, 0.0, 0.0),
            1.0,
        ));
    }
    doc
}

/// 顶层实体的圆心 X 坐标序列，用于检查顺序。
pub fn circle_xs(doc: &Document) -> Vec<f64> {
    doc.entities()
        .iter()
        .filter_map(|entity| match &entity.geometry {
            dxfmerge_core::Geometry::Circle(circle) => Some(circle.center.x()),
            _ => None,
        })
        .collect()
}
