use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::geometry::Point3;
use crate::registry::{ANONYMOUS_MARKER, Resource};

/// 内置线型，任何文档中都存在且不可替换。
pub const RESERVED_LINE_STYLES: [&str; 3] = ["ByLayer", "ByBlock", "Continuous"];
/// 内置文字样式。
pub const RESERVED_TEXT_STYLE: &str = "Standard";
/// 默认图层，悬空图层引用会被替换到这里。
pub const DEFAULT_LAYER: &str = "0";
/// 图层未指定线型时使用的线型。
pub const DEFAULT_LINE_STYLE: &str = "Continuous";

/// 图层定义。`color` 为 ACI 颜色号（1..=255），关闭状态单独记录在 `is_on`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub color: i16,
    pub line_style: String,
    /// 线宽，单位 1/100 mm；-3 表示默认，-2 ByBlock，-1 ByLayer。
    pub line_weight: i16,
    pub is_on: bool,
    pub is_frozen: bool,
    pub is_locked: bool,
}

impl LayerDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: 7,
            line_style: DEFAULT_LINE_STYLE.to_string(),
            line_weight: -3,
            is_on: true,
            is_frozen: false,
            is_locked: false,
        }
    }

    pub fn with_color(mut self, color: i16) -> Self {
        self.color = color;
        self
    }
}

impl Resource for LayerDef {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyleDef {
    pub name: String,
    pub description: String,
    /// 虚线段长度序列：正值为实线段，负值为空白，0 为点。
    pub pattern: Vec<f64>,
}

impl LineStyleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            pattern: Vec::new(),
        }
    }

    #[inline]
    pub fn pattern_length(&self) -> f64 {
        self.pattern.iter().map(|segment| segment.abs()).sum()
    }
}

impl Resource for LineStyleDef {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyleDef {
    pub name: String,
    pub font: String,
    pub width: f64,
    /// 固定字高；0 表示不固定。
    pub height: f64,
    /// 倾斜角，单位为度。
    pub oblique: f64,
}

impl TextStyleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            font: "txt".to_string(),
            width: 1.0,
            height: 0.0,
            oblique: 0.0,
        }
    }
}

impl Resource for TextStyleDef {
    fn name(&self) -> &str {
        &self.name
    }
}

/// 可复用的实体组（DXF 中的块定义）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub base_point: Point3,
    pub entities: Vec<Entity>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_point: Point3::origin(),
            entities: Vec::new(),
        }
    }

    /// 名称以 `*` 开头的组由 CAD 程序内部生成（标注、图案填充、模型空间等）。
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        is_anonymous_name(&self.name)
    }

    /// 模型空间与图纸空间布局块，名称形如 `*Model_Space`、`*Paper_Space0`。
    #[inline]
    pub fn is_layout(&self) -> bool {
        is_layout_name(&self.name)
    }
}

impl Resource for Group {
    fn name(&self) -> &str {
        &self.name
    }
}

#[inline]
pub fn is_anonymous_name(name: &str) -> bool {
    name.starts_with(ANONYMOUS_MARKER)
}

pub fn is_layout_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("*model_space") || lower.starts_with("*paper_space")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_explicit() {
        let layer = LayerDef::new("WALLS");
        assert_eq!(layer.color, 7);
        assert_eq!(layer.line_style, "Continuous");
        assert_eq!(layer.line_weight, -3);
        assert!(layer.is_on && !layer.is_frozen && !layer.is_locked);

        let style = TextStyleDef::new("Notes");
        assert_eq!(style.font, "txt");
        assert!((style.width - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn anonymous_marker_is_detected() {
        assert!(Group::new("*Model_Space").is_anonymous());
        assert!(Group::new("*U3").is_anonymous());
        assert!(!Group::new("DOOR").is_anonymous());
        assert!(Group::new("*MODEL_SPACE").is_layout());
        assert!(Group::new("*Paper_Space0").is_layout());
        assert!(!Group::new("*U3").is_layout());
    }

    #[test]
    fn pattern_length_sums_absolute_segments() {
        let mut dashed = LineStyleDef::new("DASHED");
        dashed.pattern = vec![0.5, -0.25, 0.0, -0.25];
        assert!((dashed.pattern_length() - 1.0).abs() < 1e-12);
    }
}
