use crate::entity::Entity;
use crate::geometry::{Bounds2D, Point3};
use crate::registry::Registry;
use crate::resources::{
    DEFAULT_LAYER, Group, LayerDef, LineStyleDef, RESERVED_LINE_STYLES, RESERVED_TEXT_STYLE,
    TextStyleDef,
};

/// 一张图纸的内存表示：有序的顶层实体序列加四张资源表。
#[derive(Debug, Clone)]
pub struct Document {
    entities: Vec<Entity>,
    groups: Registry<Group>,
    layers: Registry<LayerDef>,
    line_styles: Registry<LineStyleDef>,
    text_styles: Registry<TextStyleDef>,
    insertion_base: Point3,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// 新建空文档：包含内置线型、内置文字样式以及默认图层 `0`。
    pub fn new() -> Self {
        let mut doc = Self::blank();
        doc.ensure_layer(DEFAULT_LAYER);
        doc
    }

    /// 只含内置资源的文档，供解析器按文件内容填充图层表。
    pub fn blank() -> Self {
        let mut continuous = LineStyleDef::new(RESERVED_LINE_STYLES[2]);
        continuous.description = "Solid line".to_string();
        let line_styles = Registry::with_reserved([
            LineStyleDef::new(RESERVED_LINE_STYLES[0]),
            LineStyleDef::new(RESERVED_LINE_STYLES[1]),
            continuous,
        ]);
        let standard = TextStyleDef::new(RESERVED_TEXT_STYLE);
        Self {
            entities: Vec::new(),
            groups: Registry::new(),
            layers: Registry::new(),
            line_styles,
            text_styles: Registry::with_reserved([standard]),
            insertion_base: Point3::origin(),
        }
    }

    /// 图层缺失时以默认属性创建。名称不合法时不做任何改动并返回 `false`。
    pub fn ensure_layer(&mut self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        if self.layers.contains(name) {
            return true;
        }
        self.layers.insert_if_absent(LayerDef::new(name)).is_ok()
    }

    #[inline]
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    #[inline]
    pub fn clear_entities(&mut self) {
        self.entities.clear();
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn groups(&self) -> &Registry<Group> {
        &self.groups
    }

    #[inline]
    pub fn groups_mut(&mut self) -> &mut Registry<Group> {
        &mut self.groups
    }

    #[inline]
    pub fn layers(&self) -> &Registry<LayerDef> {
        &self.layers
    }

    #[inline]
    pub fn layers_mut(&mut self) -> &mut Registry<LayerDef> {
        &mut self.layers
    }

    #[inline]
    pub fn line_styles(&self) -> &Registry<LineStyleDef> {
        &self.line_styles
    }

    #[inline]
    pub fn line_styles_mut(&mut self) -> &mut Registry<LineStyleDef> {
        &mut self.line_styles
    }

    #[inline]
    pub fn text_styles(&self) -> &Registry<TextStyleDef> {
        &self.text_styles
    }

    #[inline]
    pub fn text_styles_mut(&mut self) -> &mut Registry<TextStyleDef> {
        &mut self.text_styles
    }

    #[inline]
    pub fn insertion_base(&self) -> Point3 {
        self.insertion_base
    }

    #[inline]
    pub fn set_insertion_base(&mut self, base: Point3) {
        self.insertion_base = base;
    }

    /// 将插入基点归零。文档被当作嵌套参照使用时内容不会产生偏移；
    /// 实体的绝对坐标不受影响。
    #[inline]
    pub fn reset_origin(&mut self) {
        self.insertion_base = Point3::origin();
    }

    /// 列出未在本文档图层表中定义的图层引用（顶层实体与组内实体），按出现顺序去重。
    pub fn dangling_layer_references(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        let nested = self.groups.iter().flat_map(|group| group.entities.iter());
        for entity in self.entities.iter().chain(nested) {
            let layer = entity.layer_name();
            let seen = missing
                .iter()
                .any(|name| name.to_lowercase() == layer.to_lowercase());
            if !self.layers.contains(layer) && !seen {
                missing.push(layer.to_string());
            }
        }
        missing
    }

    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        let mut has = false;
        for entity in &self.entities {
            if let Some(entity_bounds) = entity.bounds() {
                bounds.include_bounds(&entity_bounds);
                has = true;
            }
        }
        if has { Some(bounds) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_carries_reserved_resources() {
        let doc = Document::new();
        for name in RESERVED_LINE_STYLES {
            assert!(doc.line_styles().is_reserved(name), "{name} should be reserved");
        }
        assert!(doc.text_styles().is_reserved(RESERVED_TEXT_STYLE));
        assert!(doc.layers().contains(DEFAULT_LAYER));
        assert!(!doc.layers().is_reserved(DEFAULT_LAYER));
        assert_eq!(doc.entity_count(), 0);
    }

    #[test]
    fn blank_document_has_no_layers() {
        let doc = Document::blank();
        assert!(doc.layers().is_empty());
        assert_eq!(doc.line_styles().len(), 3);
        assert_eq!(doc.text_styles().len(), 1);
    }

    #[test]
    fn reset_origin_is_idempotent_and_keeps_geometry() {
        let mut doc = Document::new();
        doc.add_entity(Entity::line(
            "0",
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(7.0, 9.0, 0.0),
        ));
        doc.set_insertion_base(Point3::new(100.0, -20.0, 3.0));

        doc.reset_origin();
        let once_base = doc.insertion_base();
        let once_entities = doc.entities().to_vec();
        doc.reset_origin();

        assert_eq!(once_base, Point3::origin());
        assert_eq!(doc.insertion_base(), once_base);
        assert_eq!(doc.entities(), once_entities.as_slice());
        let bounds = doc.bounds().expect("line has bounds");
        assert!((bounds.min().x() - 5.0).abs() < 1e-12);
        assert!((bounds.max().y() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn dangling_layers_are_reported_once() {
        let mut doc = Document::new();
        doc.add_entity(Entity::line("GHOST", Point3::origin(), Point3::new(1.0, 0.0, 0.0)));
        doc.add_entity(Entity::circle("ghost", Point3::origin(), 1.0));
        doc.add_entity(Entity::circle("0", Point3::origin(), 1.0));
        let mut group = Group::new("G");
        group.entities.push(Entity::circle("PHANTOM", Point3::origin(), 2.0));
        doc.groups_mut().insert_if_absent(group).unwrap();

        assert_eq!(doc.dangling_layer_references(), ["GHOST", "PHANTOM"]);

        doc.ensure_layer("Ghost");
        doc.ensure_layer("PHANTOM");
        assert!(doc.dangling_layer_references().is_empty());
    }

    #[test]
    fn clear_entities_keeps_resources() {
        let mut doc = Document::new();
        doc.ensure_layer("KEEP");
        doc.add_entity(Entity::circle("KEEP", Point3::origin(), 1.0));
        doc.clear_entities();
        assert_eq!(doc.entity_count(), 0);
        assert!(doc.layers().contains("KEEP"));
    }
}
