pub mod document;
pub mod entity;
pub mod registry;
pub mod resources;

pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，仅用于范围估算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 三维点。DXF 实体坐标一律按三维保存，缺省 Z 为 0。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn origin() -> Self {
            Self(DVec3::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，用于椭圆主轴、缩放比例与拉伸方向。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }
    }
}

pub mod errors {
    use thiserror::Error;

    /// 名称或引用不合法。均可恢复：调用方替换默认值或跳过该条目。
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum ValidationError {
        #[error("resource name must not be empty")]
        EmptyName,
        #[error("resource name {name:?} contains forbidden character {ch:?}")]
        InvalidName { name: String, ch: char },
        #[error("reserved resource {0:?} cannot be removed or replaced")]
        ReservedName(String),
        #[error("group name {0:?} is reserved for anonymous groups")]
        AnonymousName(String),
        #[error("layer {layer:?} referenced by {kind} is not defined")]
        DanglingLayer { layer: String, kind: String },
        #[error("line style {line_style:?} referenced by {owner} is not defined")]
        DanglingLineStyle { line_style: String, owner: String },
        #[error("text style {text_style:?} referenced by {kind} is not defined")]
        DanglingTextStyle { text_style: String, kind: String },
    }

    /// 单个实体无法复制。只影响该实体，不中断所在文档的合并。
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EntityCopyError {
        #[error("{kind} entities cannot be copied")]
        Unsupported { kind: String },
        #[error("{kind} entity carries corrupt geometry: {reason}")]
        Corrupt { kind: String, reason: String },
        #[error("group reference points at missing group {name:?}")]
        UnresolvedGroup { name: String },
    }
}

pub use document::Document;
pub use entity::{Entity, EntityKind, Geometry};
pub use errors::{EntityCopyError, ValidationError};
pub use registry::{Registry, Resource};
pub use resources::{Group, LayerDef, LineStyleDef, TextStyleDef};
