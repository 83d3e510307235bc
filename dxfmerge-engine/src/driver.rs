use std::path::{Path, PathBuf};

use dxfmerge_core::Document;
use dxfmerge_core::geometry::Bounds2D;
use dxfmerge_core::resources::DEFAULT_LAYER;
use dxfmerge_io::{DocumentLoader, DocumentSaver};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{MergeError, SourceFailure};
use crate::importer::{Diagnostic, ImportOptions, Importer, MergeStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// 每个源文件的顶层实体放到以文件名（不含扩展名）命名的图层。
    pub layer_per_source: bool,
    pub default_layer: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            layer_per_source: false,
            default_layer: DEFAULT_LAYER.to_string(),
        }
    }
}

/// 单个源文件的处理状态。
///
/// `Pending → Reading → Importing → Done`，`Reading`/`Importing` 出错时进入 `Failed`。
/// 失败的源不重试：重新读取同一文件只会得到同样的错误。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SourceState {
    Pending,
    Reading,
    Importing,
    Done(MergeStats),
    Failed(SourceFailure),
}

impl SourceState {
    pub fn can_advance_to(&self, next: &SourceState) -> bool {
        matches!(
            (self, next),
            (SourceState::Pending, SourceState::Reading)
                | (SourceState::Reading, SourceState::Importing)
                | (SourceState::Reading, SourceState::Failed(_))
                | (SourceState::Importing, SourceState::Done(_))
                | (SourceState::Importing, SourceState::Failed(_))
        )
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceState::Done(_) | SourceState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceState::Pending => "pending",
            SourceState::Reading => "reading",
            SourceState::Importing => "importing",
            SourceState::Done(_) => "done",
            SourceState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub state: SourceState,
}

impl SourceOutcome {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// 整次运行的汇总计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub entities_copied: usize,
    pub entities_failed: usize,
    pub group_entities_failed: usize,
    pub groups_created: usize,
    pub resources_merged: usize,
    pub resource_conflicts: usize,
    pub warnings: usize,
}

impl RunTotals {
    fn absorb(&mut self, stats: &MergeStats) {
        self.entities_copied += stats.entities_copied;
        self.entities_failed += stats.entities_failed;
        self.group_entities_failed += stats.group_entities_failed;
        self.groups_created += stats.groups_created;
        self.resources_merged += stats.resources_merged;
        self.resource_conflicts += stats.resource_conflicts;
        self.warnings += stats.warnings;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub output: PathBuf,
    pub sources: Vec<SourceOutcome>,
    pub totals: RunTotals,
    /// 合并结果的 XY 范围；只有未建模实体时为空。
    pub extents: Option<Bounds2D>,
}

/// 一次合并运行独占的状态：目标文档、各源状态与汇总计数。
/// 目标文档只在持久化成功后以 `MergeReport` 的形式对外可见。
#[derive(Debug)]
pub(crate) struct MergeRun {
    target: Document,
    outcomes: Vec<SourceOutcome>,
    totals: RunTotals,
}

impl MergeRun {
    fn new(sources: &[PathBuf]) -> Self {
        Self {
            target: Document::new(),
            outcomes: sources
                .iter()
                .map(|path| SourceOutcome {
                    path: path.clone(),
                    state: SourceState::Pending,
                })
                .collect(),
            totals: RunTotals {
                sources: sources.len(),
                ..RunTotals::default()
            },
        }
    }

    fn advance(&mut self, index: usize, next: SourceState) {
        let outcome = &mut self.outcomes[index];
        debug_assert!(
            outcome.state.can_advance_to(&next),
            "非法状态迁移 {} -> {}",
            outcome.state.label(),
            next.label()
        );
        debug!(
            path = %outcome.path.display(),
            from = outcome.state.label(),
            to = next.label(),
            "源文件状态迁移"
        );
        match &next {
            SourceState::Done(stats) => {
                self.totals.succeeded += 1;
                self.totals.absorb(stats);
            }
            SourceState::Failed(_) => self.totals.failed += 1,
            _ => {}
        }
        outcome.state = next;
    }

    /// 校验并一次性写出目标文档。没有任何源成功时不写文件。
    pub(crate) fn persist<S: DocumentSaver>(
        self,
        saver: &S,
        output: &Path,
    ) -> Result<MergeReport, MergeError> {
        if self.totals.succeeded == 0 {
            warn!(attempted = self.outcomes.len(), "没有任何源文件合并成功");
            return Err(MergeError::NothingMerged {
                attempted: self.outcomes.len(),
            });
        }
        let layers = self.target.dangling_layer_references();
        if !layers.is_empty() {
            warn!(layers = ?layers, "目标文档引用了未定义的图层，放弃写出");
            return Err(MergeError::InvalidTarget { layers });
        }
        saver
            .save(&self.target, output)
            .map_err(|source| MergeError::Persist {
                path: output.to_path_buf(),
                source,
            })?;
        info!(
            output = %output.display(),
            succeeded = self.totals.succeeded,
            failed = self.totals.failed,
            entities = self.totals.entities_copied,
            "合并结果已写出"
        );
        Ok(MergeReport {
            output: output.to_path_buf(),
            extents: self.target.bounds(),
            sources: self.outcomes,
            totals: self.totals,
        })
    }
}

pub struct MergeDriver<L, S> {
    loader: L,
    saver: S,
    options: MergeOptions,
}

impl<L, S> MergeDriver<L, S>
where
    L: DocumentLoader,
    S: DocumentSaver,
{
    pub fn new(loader: L, saver: S, options: MergeOptions) -> Self {
        Self {
            loader,
            saver,
            options,
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// 依次读取并导入全部源文件，持久化一次目标文档。
    pub fn run(&self, sources: &[PathBuf], output: &Path) -> Result<MergeReport, MergeError> {
        if sources.is_empty() {
            return Err(MergeError::NoSources);
        }
        self.merge(sources).persist(&self.saver, output)
    }

    fn merge(&self, sources: &[PathBuf]) -> MergeRun {
        let mut run = MergeRun::new(sources);
        for (index, path) in sources.iter().enumerate() {
            run.advance(index, SourceState::Reading);
            let mut document = match self.loader.load(path) {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "读取源文件失败，跳过");
                    run.advance(index, SourceState::Failed(SourceFailure::from(&err)));
                    continue;
                }
            };
            document.reset_origin();

            run.advance(index, SourceState::Importing);
            let report = Importer::new(self.import_options_for(path)).import(&document, &mut run.target);
            log_diagnostics(path, &report.diagnostics);
            info!(
                path = %path.display(),
                entities = report.stats.entities_copied,
                failed = report.stats.entities_failed,
                "源文件已合并"
            );
            run.advance(index, SourceState::Done(report.stats));
        }
        run
    }

    fn import_options_for(&self, path: &Path) -> ImportOptions {
        let source_layer = if self.options.layer_per_source {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        } else {
            None
        };
        ImportOptions {
            source_layer,
            default_layer: self.options.default_layer.clone(),
        }
    }
}

fn log_diagnostics(path: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        if diagnostic.is_warning() {
            warn!(path = %path.display(), "{diagnostic}");
        } else {
            info!(path = %path.display(), "{diagnostic}");
        }
    }
}
