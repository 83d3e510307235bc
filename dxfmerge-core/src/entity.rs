use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::errors::EntityCopyError;
use crate::geometry::{Bounds2D, Point2, Point3, Vector3};

/// 复制路径拒绝处理的 DXF 实体类型：其数据为应用程序私有的二进制内容。
pub const UNCOPYABLE_KINDS: [&str; 1] = ["ACAD_PROXY_ENTITY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Line,
    Circle,
    Arc,
    Ellipse,
    Polyline,
    Text,
    MText,
    GroupReference,
    Opaque,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Line => "line",
            EntityKind::Circle => "circle",
            EntityKind::Arc => "arc",
            EntityKind::Ellipse => "ellipse",
            EntityKind::Polyline => "polyline",
            EntityKind::Text => "text",
            EntityKind::MText => "mtext",
            EntityKind::GroupReference => "group reference",
            EntityKind::Opaque => "opaque",
        };
        f.write_str(label)
    }
}

/// 单个图元。图层、线型只按名称引用，不持有对应定义。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub layer: String,
    /// ACI 颜色号；`None` 表示随层。
    pub color: Option<i16>,
    /// 实体线型；`None` 表示随层。
    pub line_style: Option<String>,
    pub extrusion: Option<Vector3>,
    pub geometry: Geometry,
    /// 类型化实体中未建模的组码（厚度、真彩色、扩展数据等），写出时原样附在末尾。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_pairs: Vec<(i32, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Ellipse(Ellipse),
    Polyline(Polyline),
    Text(Text),
    MText(MText),
    GroupReference(GroupReference),
    Opaque(OpaqueEntity),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point3,
    pub end: Point3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point3,
    pub radius: f64,
}

/// 圆弧实体，角度与 DXF 一致以度为单位储存，逆时针为正。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

/// 椭圆实体，主轴为相对圆心的向量，参数范围单位为弧度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point3,
    pub major_axis: Vector3,
    pub ratio: f64,
    pub start_parameter: f64,
    pub end_parameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub position: Point2,
    pub bulge: f64,
    pub start_width: Option<f64>,
    pub end_width: Option<f64>,
}

impl PolylineVertex {
    #[inline]
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            bulge: 0.0,
            start_width: None,
            end_width: None,
        }
    }

    #[inline]
    pub fn with_bulge(position: Point2, bulge: f64) -> Self {
        Self {
            bulge,
            ..Self::new(position)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    pub is_closed: bool,
    pub elevation: f64,
    pub constant_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub insert: Point3,
    pub content: String,
    pub height: f64,
    /// 旋转角，单位为度。
    pub rotation: f64,
    pub style: Option<String>,
    pub width_factor: Option<f64>,
    pub alignment: Option<Point3>,
    pub horizontal_align: i16,
    pub vertical_align: i16,
}

/// 多行文字。`content` 保留原始格式控制码，不做解码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MText {
    pub insert: Point3,
    pub content: String,
    pub height: f64,
    pub reference_width: Option<f64>,
    pub attachment_point: i16,
    pub drawing_direction: i16,
    pub direction: Option<Vector3>,
    pub rotation: Option<f64>,
    pub style: Option<String>,
}

/// 组参照：把命名组放到某个位置，而不复制其内容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReference {
    pub group: String,
    pub insert: Point3,
    pub scale: Vector3,
    /// 旋转角，单位为度。
    pub rotation: f64,
    /// 紧随其后的 ATTRIB…SEQEND 记录，按原始组码保存。
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(i32, String)>,
}

impl GroupReference {
    pub fn new(group: impl Into<String>, insert: Point3) -> Self {
        Self {
            group: group.into(),
            insert,
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: 0.0,
            attributes: Vec::new(),
        }
    }
}

/// 未建模的实体类型，按原始组码原样保存（可包含嵌套记录）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueEntity {
    pub kind: String,
    pub pairs: Vec<(i32, String)>,
}

impl Entity {
    pub fn new(layer: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            layer: layer.into(),
            color: None,
            line_style: None,
            extrusion: None,
            geometry,
            extra_pairs: Vec::new(),
        }
    }

    pub fn line(layer: impl Into<String>, start: Point3, end: Point3) -> Self {
        Self::new(layer, Geometry::Line(Line { start, end }))
    }

    pub fn circle(layer: impl Into<String>, center: Point3, radius: f64) -> Self {
        Self::new(layer, Geometry::Circle(Circle { center, radius }))
    }

    pub fn group_reference(layer: impl Into<String>, group: impl Into<String>, insert: Point3) -> Self {
        Self::new(
            layer,
            Geometry::GroupReference(GroupReference::new(group, insert)),
        )
    }

    #[inline]
    pub fn layer_name(&self) -> &str {
        &self.layer
    }

    pub fn kind(&self) -> EntityKind {
        match &self.geometry {
            Geometry::Line(_) => EntityKind::Line,
            Geometry::Circle(_) => EntityKind::Circle,
            Geometry::Arc(_) => EntityKind::Arc,
            Geometry::Ellipse(_) => EntityKind::Ellipse,
            Geometry::Polyline(_) => EntityKind::Polyline,
            Geometry::Text(_) => EntityKind::Text,
            Geometry::MText(_) => EntityKind::MText,
            Geometry::GroupReference(_) => EntityKind::GroupReference,
            Geometry::Opaque(_) => EntityKind::Opaque,
        }
    }

    /// DXF 实体类型名。
    pub fn dxf_type(&self) -> &str {
        match &self.geometry {
            Geometry::Line(_) => "LINE",
            Geometry::Circle(_) => "CIRCLE",
            Geometry::Arc(_) => "ARC",
            Geometry::Ellipse(_) => "ELLIPSE",
            Geometry::Polyline(_) => "LWPOLYLINE",
            Geometry::Text(_) => "TEXT",
            Geometry::MText(_) => "MTEXT",
            Geometry::GroupReference(_) => "INSERT",
            Geometry::Opaque(opaque) => &opaque.kind,
        }
    }

    #[inline]
    pub fn group_name(&self) -> Option<&str> {
        match &self.geometry {
            Geometry::GroupReference(reference) => Some(&reference.group),
            _ => None,
        }
    }

    #[inline]
    pub fn text_style(&self) -> Option<&str> {
        match &self.geometry {
            Geometry::Text(text) => text.style.as_deref(),
            Geometry::MText(mtext) => mtext.style.as_deref(),
            _ => None,
        }
    }

    /// 清除文字样式引用，回退到内置样式。
    pub fn clear_text_style(&mut self) {
        match &mut self.geometry {
            Geometry::Text(text) => text.style = None,
            Geometry::MText(mtext) => mtext.style = None,
            _ => {}
        }
    }

    /// 生成与原实体字段完全相同、且不共享任何可变数据的新实体。
    pub fn try_copy(&self) -> Result<Entity, EntityCopyError> {
        if let Geometry::Opaque(opaque) = &self.geometry {
            if UNCOPYABLE_KINDS
                .iter()
                .any(|kind| opaque.kind.eq_ignore_ascii_case(kind))
            {
                return Err(EntityCopyError::Unsupported {
                    kind: opaque.kind.clone(),
                });
            }
        }
        if let Some(reason) = self.corruption() {
            return Err(EntityCopyError::Corrupt {
                kind: self.dxf_type().to_string(),
                reason,
            });
        }
        Ok(self.clone())
    }

    fn corruption(&self) -> Option<String> {
        if let Some(extrusion) = self.extrusion {
            if !extrusion.is_finite() {
                return Some("non-finite extrusion direction".to_string());
            }
        }
        match &self.geometry {
            Geometry::Line(line) => first_non_finite_point(&[("start", line.start), ("end", line.end)]),
            Geometry::Circle(circle) => first_non_finite_point(&[("center", circle.center)])
                .or_else(|| first_non_finite(&[("radius", circle.radius)])),
            Geometry::Arc(arc) => first_non_finite_point(&[("center", arc.center)]).or_else(|| {
                first_non_finite(&[
                    ("radius", arc.radius),
                    ("start angle", arc.start_angle),
                    ("end angle", arc.end_angle),
                ])
            }),
            Geometry::Ellipse(ellipse) => first_non_finite_point(&[("center", ellipse.center)])
                .or_else(|| {
                    (!ellipse.major_axis.is_finite()).then(|| "non-finite major axis".to_string())
                })
                .or_else(|| {
                    first_non_finite(&[
                        ("ratio", ellipse.ratio),
                        ("start parameter", ellipse.start_parameter),
                        ("end parameter", ellipse.end_parameter),
                    ])
                }),
            Geometry::Polyline(polyline) => {
                if polyline.vertices.is_empty() {
                    return Some("polyline has no vertices".to_string());
                }
                polyline.vertices.iter().enumerate().find_map(|(index, vertex)| {
                    let finite = vertex.position.as_vec2().is_finite() && vertex.bulge.is_finite();
                    (!finite).then(|| format!("non-finite vertex {index}"))
                })
            }
            Geometry::Text(text) => first_non_finite_point(&[("insert", text.insert)])
                .or_else(|| first_non_finite(&[("height", text.height), ("rotation", text.rotation)])),
            Geometry::MText(mtext) => first_non_finite_point(&[("insert", mtext.insert)])
                .or_else(|| first_non_finite(&[("height", mtext.height)])),
            Geometry::GroupReference(reference) => {
                if reference.group.trim().is_empty() {
                    return Some("group reference without group name".to_string());
                }
                first_non_finite_point(&[("insert", reference.insert)])
                    .or_else(|| (!reference.scale.is_finite()).then(|| "non-finite scale".to_string()))
                    .or_else(|| first_non_finite(&[("rotation", reference.rotation)]))
            }
            Geometry::Opaque(_) => None,
        }
    }

    /// 计算实体的 2D 轴对齐范围，文本与组参照退化为插入点，未建模实体没有范围。
    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        match &self.geometry {
            Geometry::Line(line) => {
                bounds.include_point(line.start.xy());
                bounds.include_point(line.end.xy());
            }
            Geometry::Circle(circle) => {
                let radius = circle.radius.abs();
                let center = circle.center;
                bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
            }
            Geometry::Arc(arc) => arc_bounds(arc, &mut bounds),
            Geometry::Ellipse(ellipse) => ellipse_bounds(ellipse, &mut bounds),
            Geometry::Polyline(polyline) => {
                for vertex in &polyline.vertices {
                    bounds.include_point(vertex.position);
                }
            }
            Geometry::Text(text) => bounds.include_point(text.insert.xy()),
            Geometry::MText(mtext) => bounds.include_point(mtext.insert.xy()),
            Geometry::GroupReference(reference) => bounds.include_point(reference.insert.xy()),
            Geometry::Opaque(_) => {}
        }
        if bounds.is_empty() { None } else { Some(bounds) }
    }
}

fn first_non_finite(values: &[(&str, f64)]) -> Option<String> {
    values
        .iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(label, _)| format!("non-finite {label}"))
}

fn first_non_finite_point(points: &[(&str, Point3)]) -> Option<String> {
    points
        .iter()
        .find(|(_, point)| !point.is_finite())
        .map(|(label, _)| format!("non-finite {label} point"))
}

fn normalize_angle(angle: f64) -> f64 {
    let mut result = angle % TAU;
    if result < 0.0 {
        result += TAU;
    }
    result
}

fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
    let start = normalize_angle(start);
    let mut end = normalize_angle(end);
    if (end - start).abs() < 1e-9 {
        end = start + TAU;
    } else if end < start {
        end += TAU;
    }
    (start, end)
}

fn arc_point(center: Point3, radius: f64, angle: f64) -> Point2 {
    Point2::new(
        center.x() + radius * angle.cos(),
        center.y() + radius * angle.sin(),
    )
}

fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
    let radius = arc.radius.abs();
    if radius <= f64::EPSILON {
        bounds.include_point(arc.center.xy());
        return;
    }
    let (start, end) = canonical_interval(arc.start_angle.to_radians(), arc.end_angle.to_radians());
    bounds.include_point(arc_point(arc.center, radius, start));
    bounds.include_point(arc_point(arc.center, radius, end));

    const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
    for base in QUADRANTS {
        let mut candidate = base;
        while candidate < start {
            candidate += TAU;
        }
        if candidate <= end {
            bounds.include_point(arc_point(arc.center, radius, candidate));
        }
    }
}

/// 椭圆参数方程 `c + a·cos t + b·sin t` 在每个坐标轴上的极值出现在 `atan2(b, a)` 与其对径点。
fn ellipse_bounds(ellipse: &Ellipse, bounds: &mut Bounds2D) {
    let major = ellipse.major_axis.as_vec3();
    if major.length() <= f64::EPSILON {
        bounds.include_point(ellipse.center.xy());
        return;
    }
    let minor = DVec3::Z.cross(major) * ellipse.ratio.abs();
    let center = ellipse.center.as_vec3();
    let point_at = |t: f64| {
        let point = center + major * t.cos() + minor * t.sin();
        Point2::new(point.x, point.y)
    };

    let (start, end) = canonical_interval(ellipse.start_parameter, ellipse.end_parameter);
    bounds.include_point(point_at(start));
    bounds.include_point(point_at(end));

    let x_extreme = minor.x.atan2(major.x);
    let y_extreme = minor.y.atan2(major.y);
    for base in [x_extreme, x_extreme + PI, y_extreme, y_extreme + PI] {
        let mut candidate = normalize_angle(base);
        if candidate < start {
            candidate += TAU;
        }
        if candidate <= end {
            bounds.include_point(point_at(candidate));
        }
    }
}
