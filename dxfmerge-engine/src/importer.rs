use std::fmt;

use dxfmerge_core::registry::validate_name;
use dxfmerge_core::resources::{DEFAULT_LAYER, DEFAULT_LINE_STYLE};
use dxfmerge_core::{
    Document, Entity, EntityCopyError, Group, Registry, Resource, ValidationError,
};
use serde::{Deserialize, Serialize};

/// 单个源文件导入的计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub entities_copied: usize,
    pub entities_failed: usize,
    /// 新建组时丢弃的组内实体。
    pub group_entities_failed: usize,
    pub groups_created: usize,
    /// 新写入目标的图层、线型与文字样式。
    pub resources_merged: usize,
    pub resource_conflicts: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Group,
    Layer,
    LineStyle,
    TextStyle,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Group => "group",
            ResourceKind::Layer => "layer",
            ResourceKind::LineStyle => "line style",
            ResourceKind::TextStyle => "text style",
        };
        f.write_str(label)
    }
}

/// 导入过程中的可恢复事件。除 `ResourceConflict` 外都计为警告。
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    EntityDropped {
        /// 实体在所属序列（顶层或组内）中的位置。
        index: usize,
        kind: String,
        group: Option<String>,
        error: EntityCopyError,
    },
    LayerSubstituted {
        error: ValidationError,
        replacement: String,
    },
    LineStyleCleared {
        error: ValidationError,
    },
    TextStyleCleared {
        error: ValidationError,
    },
    ResourceConflict {
        kind: ResourceKind,
        name: String,
    },
    ResourceRejected {
        kind: ResourceKind,
        error: ValidationError,
    },
    SourceLayerRejected {
        error: ValidationError,
    },
}

impl Diagnostic {
    #[inline]
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::ResourceConflict { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EntityDropped {
                index,
                kind,
                group: Some(group),
                error,
            } => write!(f, "dropped {kind} #{index} of group {group:?}: {error}"),
            Diagnostic::EntityDropped {
                index,
                kind,
                group: None,
                error,
            } => write!(f, "dropped {kind} #{index}: {error}"),
            Diagnostic::LayerSubstituted { error, replacement } => {
                write!(f, "{error}; moved to layer {replacement:?}")
            }
            Diagnostic::LineStyleCleared { error } => write!(f, "{error}; line style reset"),
            Diagnostic::TextStyleCleared { error } => write!(f, "{error}; text style reset"),
            Diagnostic::ResourceConflict { kind, name } => write!(
                f,
                "{kind} {name:?} is already defined differently; keeping the first definition"
            ),
            Diagnostic::ResourceRejected { kind, error } => write!(f, "{kind} skipped: {error}"),
            Diagnostic::SourceLayerRejected { error } => {
                write!(f, "source layer not applied: {error}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub stats: MergeStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportReport {
    fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            self.stats.warnings += 1;
        } else {
            self.stats.resource_conflicts += 1;
        }
        self.diagnostics.push(diagnostic);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// 把该源的全部顶层实体放到这一图层（缺失时按默认属性创建）。
    pub source_layer: Option<String>,
    /// 悬空图层引用的替换目标。
    pub default_layer: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source_layer: None,
            default_layer: DEFAULT_LAYER.to_string(),
        }
    }
}

/// 把一个源文档并入目标文档。
///
/// 顺序固定：非匿名组、图层、线型、文字样式，最后是顶层实体。
/// 所有资源按先写者胜合并，引用按源文档自身的资源表校验。
#[derive(Debug, Clone, Default)]
pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn import(&self, source: &Document, target: &mut Document) -> ImportReport {
        let mut session = ImportSession {
            source,
            target,
            report: ImportReport::default(),
            default_layer: DEFAULT_LAYER.to_string(),
        };
        session.prepare_default_layer(&self.options.default_layer);
        session.merge_groups();
        session.merge_layers();
        session.merge_line_styles();
        session.merge_text_styles();
        let source_layer = self
            .options
            .source_layer
            .as_deref()
            .and_then(|name| session.prepare_source_layer(name));
        session.merge_entities(source_layer.as_deref());
        session.report
    }
}

/// 以默认选项导入，只返回计数。
pub fn import(source: &Document, target: &mut Document) -> MergeStats {
    Importer::default().import(source, target).stats
}

struct ImportSession<'a> {
    source: &'a Document,
    target: &'a mut Document,
    report: ImportReport,
    default_layer: String,
}

impl ImportSession<'_> {
    fn prepare_default_layer(&mut self, requested: &str) {
        let name = match validate_name(requested) {
            Ok(()) => requested,
            Err(error) => {
                self.report.push(Diagnostic::ResourceRejected {
                    kind: ResourceKind::Layer,
                    error,
                });
                DEFAULT_LAYER
            }
        };
        self.target.ensure_layer(name);
        self.default_layer = canonical_name(self.target.layers(), name);
    }

    fn prepare_source_layer(&mut self, requested: &str) -> Option<String> {
        if let Err(error) = validate_name(requested) {
            self.report.push(Diagnostic::SourceLayerRejected { error });
            return None;
        }
        if !self.target.layers().contains(requested) {
            self.target.ensure_layer(requested);
            self.report.stats.resources_merged += 1;
        }
        Some(canonical_name(self.target.layers(), requested))
    }

    fn merge_groups(&mut self) {
        let source = self.source;
        for group in source.groups().iter() {
            if group.is_anonymous() {
                continue;
            }
            if let Some(existing) = self.target.groups().get(&group.name) {
                if existing.base_point != group.base_point || existing.entities != group.entities
                {
                    self.report.push(Diagnostic::ResourceConflict {
                        kind: ResourceKind::Group,
                        name: group.name.clone(),
                    });
                }
                continue;
            }

            let mut created = Group::new(group.name.clone());
            created.base_point = group.base_point;
            for (index, entity) in group.entities.iter().enumerate() {
                match self.copy_entity(entity) {
                    Ok(copy) => created.entities.push(copy),
                    Err(error) => {
                        self.report.stats.group_entities_failed += 1;
                        self.report.push(Diagnostic::EntityDropped {
                            index,
                            kind: entity.dxf_type().to_string(),
                            group: Some(group.name.clone()),
                            error,
                        });
                    }
                }
            }
            match self.target.groups_mut().insert_if_absent(created) {
                Ok(true) => self.report.stats.groups_created += 1,
                Ok(false) => {}
                Err(error) => self.report.push(Diagnostic::ResourceRejected {
                    kind: ResourceKind::Group,
                    error,
                }),
            }
        }
    }

    fn merge_layers(&mut self) {
        let source = self.source;
        for layer in source.layers().iter() {
            let mut definition = layer.clone();
            if !source.line_styles().contains(&definition.line_style) {
                self.report.push(Diagnostic::LineStyleCleared {
                    error: ValidationError::DanglingLineStyle {
                        line_style: definition.line_style.clone(),
                        owner: format!("layer {:?}", definition.name),
                    },
                });
                definition.line_style = DEFAULT_LINE_STYLE.to_string();
            }
            merge_resource(
                self.target.layers_mut(),
                ResourceKind::Layer,
                definition,
                &mut self.report,
            );
        }
    }

    fn merge_line_styles(&mut self) {
        for style in self.source.line_styles().iter() {
            if self.source.line_styles().is_reserved(&style.name) {
                continue;
            }
            merge_resource(
                self.target.line_styles_mut(),
                ResourceKind::LineStyle,
                style.clone(),
                &mut self.report,
            );
        }
    }

    fn merge_text_styles(&mut self) {
        for style in self.source.text_styles().iter() {
            if self.source.text_styles().is_reserved(&style.name) {
                continue;
            }
            merge_resource(
                self.target.text_styles_mut(),
                ResourceKind::TextStyle,
                style.clone(),
                &mut self.report,
            );
        }
    }

    fn merge_entities(&mut self, source_layer: Option<&str>) {
        let source = self.source;
        for (index, entity) in source.entities().iter().enumerate() {
            match self.copy_entity(entity) {
                Ok(mut copy) => {
                    if let Some(layer) = source_layer {
                        copy.layer = layer.to_string();
                    }
                    self.target.add_entity(copy);
                    self.report.stats.entities_copied += 1;
                }
                Err(error) => {
                    self.report.stats.entities_failed += 1;
                    self.report.push(Diagnostic::EntityDropped {
                        index,
                        kind: entity.dxf_type().to_string(),
                        group: None,
                        error,
                    });
                }
            }
        }
    }

    /// 复制实体并按源文档的资源表修正引用。
    fn copy_entity(&mut self, entity: &Entity) -> Result<Entity, EntityCopyError> {
        let mut copy = entity.try_copy()?;
        if let Some(group) = copy.group_name() {
            if !self.group_resolves(group) {
                return Err(EntityCopyError::UnresolvedGroup {
                    name: group.to_string(),
                });
            }
        }
        self.normalize_references(&mut copy);
        Ok(copy)
    }

    fn group_resolves(&self, name: &str) -> bool {
        self.target.groups().contains(name)
            || self
                .source
                .groups()
                .get(name)
                .is_some_and(|group| !group.is_anonymous())
    }

    fn normalize_references(&mut self, entity: &mut Entity) {
        let source = self.source;
        if !source.layers().contains(&entity.layer) {
            let error = ValidationError::DanglingLayer {
                layer: entity.layer.clone(),
                kind: entity.dxf_type().to_string(),
            };
            entity.layer = self.default_layer.clone();
            self.report.push(Diagnostic::LayerSubstituted {
                error,
                replacement: self.default_layer.clone(),
            });
        }

        if let Some(line_style) = &entity.line_style {
            if !source.line_styles().contains(line_style) {
                let error = ValidationError::DanglingLineStyle {
                    line_style: line_style.clone(),
                    owner: format!("{} entity", entity.dxf_type()),
                };
                entity.line_style = None;
                self.report.push(Diagnostic::LineStyleCleared { error });
            }
        }

        if let Some(text_style) = entity.text_style() {
            if !source.text_styles().contains(text_style) {
                let error = ValidationError::DanglingTextStyle {
                    text_style: text_style.to_string(),
                    kind: entity.dxf_type().to_string(),
                };
                entity.clear_text_style();
                self.report.push(Diagnostic::TextStyleCleared { error });
            }
        }
    }
}

/// 先写者胜：已存在时只在定义不同的情况下记录冲突。
fn merge_resource<T>(
    registry: &mut Registry<T>,
    kind: ResourceKind,
    definition: T,
    report: &mut ImportReport,
) where
    T: Resource + PartialEq,
{
    if registry.is_reserved(definition.name()) {
        return;
    }
    if let Some(existing) = registry.get(definition.name()) {
        if *existing != definition {
            report.push(Diagnostic::ResourceConflict {
                kind,
                name: definition.name().to_string(),
            });
        }
        return;
    }
    match registry.insert_if_absent(definition) {
        Ok(true) => report.stats.resources_merged += 1,
        Ok(false) => {}
        Err(error) => report.push(Diagnostic::ResourceRejected { kind, error }),
    }
}

fn canonical_name<T: Resource>(registry: &Registry<T>, name: &str) -> String {
    registry
        .get(name)
        .map_or_else(|| name.to_string(), |entry| entry.name().to_string())
}
