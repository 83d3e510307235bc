use std::fmt::Display;

use dxfmerge_core::entity::{GroupReference, MText, OpaqueEntity, Polyline, Text};
use dxfmerge_core::geometry::{Point3, Vector3};
use dxfmerge_core::{Document, Entity, Geometry, Group, LayerDef, LineStyleDef, TextStyleDef};

use crate::reader::{Pair, head_region_end};

/// MTEXT 正文每个组码值的最大字符数。
const MTEXT_CHUNK: usize = 250;
/// AutoCAD 2000 格式。
const ACAD_VERSION: &str = "AC1015";
const MODEL_SPACE: &str = "*Model_Space";
const PAPER_SPACE: &str = "*Paper_Space";

/// 写出完整的 R2000 文档。
///
/// 句柄在写出时重新分配，源文件中的句柄不会保留。布局块（`*Model_Space`、`*Paper_Space`）
/// 总是按空块重建，文档中同名的组不会写出。
pub(crate) fn write_document(document: &Document) -> String {
    let mut body = DxfWriter::default();
    let records = body.tables(document);
    body.blocks(document, &records);
    body.entities(document, &records.model_space);
    body.objects();

    let mut writer = DxfWriter::default();
    writer.header(document, body.next_handle + 1);
    writer.out.push_str(&body.out);
    writer.pair(0, "EOF");
    writer.out
}

/// BLOCK_RECORD 表中的句柄。实体以所在块的记录为所有者。
struct BlockRecords {
    model_space: String,
    paper_space: String,
    /// 与 [`exported_groups`] 的顺序一一对应。
    groups: Vec<String>,
}

fn exported_groups(document: &Document) -> impl Iterator<Item = &Group> {
    document.groups().iter().filter(|group| !group.is_layout())
}

/// AcDbEntity 子类中的组码，写在实体头部。
fn is_entity_level_code(code: i32) -> bool {
    matches!(
        code,
        48 | 60 | 67 | 284 | 347 | 370 | 390 | 410 | 420 | 430 | 440
    )
}

#[derive(Default)]
struct DxfWriter {
    out: String,
    next_handle: u64,
}

impl DxfWriter {
    fn pair(&mut self, code: i32, value: impl Display) {
        self.out.push_str(&format!("{code:>3}\n{value}\n"));
    }

    /// 浮点数以最短可往返的形式写出，重新读取后位模式不变。
    fn float(&mut self, code: i32, value: f64) {
        self.pair(code, format!("{value:?}"));
    }

    fn point(&mut self, base: i32, point: Point3) {
        self.float(base, point.x());
        self.float(base + 10, point.y());
        self.float(base + 20, point.z());
    }

    fn vector(&mut self, base: i32, vector: Vector3) {
        self.float(base, vector.x());
        self.float(base + 10, vector.y());
        self.float(base + 20, vector.z());
    }

    /// 分配下一个十六进制句柄。0 表示空所有者，不会分配。
    fn handle(&mut self) -> String {
        self.next_handle += 1;
        format!("{:X}", self.next_handle)
    }

    /// 记录起始：类型、新句柄与所有者。返回分配的句柄。
    fn begin_record(&mut self, kind: &str, owner: &str) -> String {
        let handle = self.handle();
        self.pair(0, kind);
        self.pair(5, &handle);
        self.pair(330, owner);
        handle
    }

    fn begin_section(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn end_section(&mut self) {
        self.pair(0, "ENDSEC");
    }

    fn header(&mut self, document: &Document, handle_seed: u64) {
        self.begin_section("HEADER");
        self.pair(9, "$ACADVER");
        self.pair(1, ACAD_VERSION);
        self.pair(9, "$HANDSEED");
        self.pair(5, format!("{handle_seed:X}"));
        self.pair(9, "$INSBASE");
        self.point(10, document.insertion_base());
        if let Some(bounds) = document.bounds() {
            self.pair(9, "$EXTMIN");
            self.point(10, Point3::new(bounds.min().x(), bounds.min().y(), 0.0));
            self.pair(9, "$EXTMAX");
            self.point(10, Point3::new(bounds.max().x(), bounds.max().y(), 0.0));
        }
        self.end_section();
    }

    fn tables(&mut self, document: &Document) -> BlockRecords {
        self.begin_section("TABLES");

        self.begin_table("VPORT", 0);
        self.end_table();

        let table = self.begin_table("LTYPE", document.line_styles().len());
        for style in document.line_styles().iter() {
            self.line_style(style, &table);
        }
        self.end_table();

        let table = self.begin_table("LAYER", document.layers().len());
        for layer in document.layers().iter() {
            self.layer(layer, &table);
        }
        self.end_table();

        let table = self.begin_table("STYLE", document.text_styles().len());
        for style in document.text_styles().iter() {
            self.text_style(style, &table);
        }
        self.end_table();

        self.begin_table("VIEW", 0);
        self.end_table();
        self.begin_table("UCS", 0);
        self.end_table();

        let table = self.begin_table("APPID", 1);
        self.table_entry("APPID", &table, "AcDbRegAppTableRecord");
        self.pair(2, "ACAD");
        self.pair(70, 0);
        self.end_table();

        self.dimension_styles();

        let names: Vec<&str> = exported_groups(document)
            .map(|group| group.name.as_str())
            .collect();
        let table = self.begin_table("BLOCK_RECORD", names.len() + 2);
        let model_space = self.block_record(MODEL_SPACE, &table);
        let paper_space = self.block_record(PAPER_SPACE, &table);
        let groups = names
            .into_iter()
            .map(|name| self.block_record(name, &table))
            .collect();
        self.end_table();

        self.end_section();
        BlockRecords {
            model_space,
            paper_space,
            groups,
        }
    }

    fn begin_table(&mut self, name: &str, count: usize) -> String {
        let handle = self.handle();
        self.pair(0, "TABLE");
        self.pair(2, name);
        self.pair(5, &handle);
        self.pair(330, 0);
        self.pair(100, "AcDbSymbolTable");
        self.pair(70, count);
        handle
    }

    fn end_table(&mut self) {
        self.pair(0, "ENDTAB");
    }

    fn table_entry(&mut self, kind: &str, table: &str, subclass: &str) -> String {
        let handle = self.begin_record(kind, table);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, subclass);
        handle
    }

    /// DIMSTYLE 表头带有额外的子类，条目句柄使用组码 105。
    fn dimension_styles(&mut self) {
        let table = self.handle();
        self.pair(0, "TABLE");
        self.pair(2, "DIMSTYLE");
        self.pair(5, &table);
        self.pair(330, 0);
        self.pair(100, "AcDbSymbolTable");
        self.pair(70, 1);
        self.pair(100, "AcDbDimStyleTable");
        self.pair(71, 0);

        let handle = self.handle();
        self.pair(0, "DIMSTYLE");
        self.pair(105, handle);
        self.pair(330, &table);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, "AcDbDimStyleTableRecord");
        self.pair(2, "Standard");
        self.pair(70, 0);
        self.end_table();
    }

    fn block_record(&mut self, name: &str, table: &str) -> String {
        let handle = self.table_entry("BLOCK_RECORD", table, "AcDbBlockTableRecord");
        self.pair(2, name);
        handle
    }

    fn line_style(&mut self, style: &LineStyleDef, table: &str) {
        self.table_entry("LTYPE", table, "AcDbLinetypeTableRecord");
        self.pair(2, &style.name);
        self.pair(70, 0);
        self.pair(3, &style.description);
        self.pair(72, 65);
        self.pair(73, style.pattern.len());
        self.float(40, style.pattern_length());
        for segment in &style.pattern {
            self.float(49, *segment);
            self.pair(74, 0);
        }
    }

    fn layer(&mut self, layer: &LayerDef, table: &str) {
        let mut flags = 0;
        if layer.is_frozen {
            flags |= 1;
        }
        if layer.is_locked {
            flags |= 4;
        }
        self.table_entry("LAYER", table, "AcDbLayerTableRecord");
        self.pair(2, &layer.name);
        self.pair(70, flags);
        self.pair(62, if layer.is_on { layer.color } else { -layer.color });
        self.pair(6, &layer.line_style);
        self.pair(370, layer.line_weight);
    }

    fn text_style(&mut self, style: &TextStyleDef, table: &str) {
        self.table_entry("STYLE", table, "AcDbTextStyleTableRecord");
        self.pair(2, &style.name);
        self.pair(70, 0);
        self.float(40, style.height);
        self.float(41, style.width);
        self.float(50, style.oblique);
        self.pair(71, 0);
        self.float(42, 2.5);
        self.pair(3, &style.font);
        self.pair(4, "");
    }

    fn blocks(&mut self, document: &Document, records: &BlockRecords) {
        self.begin_section("BLOCKS");
        self.begin_block(MODEL_SPACE, &records.model_space, Point3::origin(), 0, false);
        self.end_block(&records.model_space, false);
        self.begin_block(PAPER_SPACE, &records.paper_space, Point3::origin(), 0, true);
        self.end_block(&records.paper_space, true);
        for (group, record) in exported_groups(document).zip(&records.groups) {
            self.group(group, record);
        }
        self.end_section();
    }

    fn begin_block(
        &mut self,
        name: &str,
        record: &str,
        base_point: Point3,
        flags: i16,
        paper_space: bool,
    ) {
        self.begin_record("BLOCK", record);
        self.pair(100, "AcDbEntity");
        if paper_space {
            self.pair(67, 1);
        }
        self.pair(8, "0");
        self.pair(100, "AcDbBlockBegin");
        self.pair(2, name);
        self.pair(70, flags);
        self.point(10, base_point);
        self.pair(3, name);
        self.pair(1, "");
    }

    fn end_block(&mut self, record: &str, paper_space: bool) {
        self.begin_record("ENDBLK", record);
        self.pair(100, "AcDbEntity");
        if paper_space {
            self.pair(67, 1);
        }
        self.pair(8, "0");
        self.pair(100, "AcDbBlockEnd");
    }

    fn group(&mut self, group: &Group, record: &str) {
        let flags = if group.is_anonymous() { 1 } else { 0 };
        self.begin_block(&group.name, record, group.base_point, flags, false);
        for entity in &group.entities {
            self.entity(entity, record);
        }
        self.end_block(record, false);
    }

    fn entities(&mut self, document: &Document, owner: &str) {
        self.begin_section("ENTITIES");
        for entity in document.entities() {
            self.entity(entity, owner);
        }
        self.end_section();
    }

    /// 只含一个空组字典的根字典。
    fn objects(&mut self) {
        self.begin_section("OBJECTS");
        let root = self.begin_record("DICTIONARY", "0");
        self.pair(100, "AcDbDictionary");
        self.pair(281, 1);
        self.pair(3, "ACAD_GROUP");
        self.pair(350, format!("{:X}", self.next_handle + 1));
        self.begin_record("DICTIONARY", &root);
        self.pair(100, "AcDbDictionary");
        self.pair(281, 1);
        self.end_section();
    }

    fn entity(&mut self, entity: &Entity, owner: &str) {
        if let Geometry::Opaque(opaque) = &entity.geometry {
            self.opaque(entity, opaque, owner);
            return;
        }

        let handle = self.begin_record(entity.dxf_type(), owner);
        self.pair(100, "AcDbEntity");
        self.pair(8, &entity.layer);
        if let Some(line_style) = &entity.line_style {
            self.pair(6, line_style);
        }
        if let Some(color) = entity.color {
            self.pair(62, color);
        }
        let (head, rest): (Vec<&Pair>, Vec<&Pair>) = entity
            .extra_pairs
            .iter()
            .partition(|(code, _)| is_entity_level_code(*code));
        let (extended, subclass): (Vec<&Pair>, Vec<&Pair>) =
            rest.into_iter().partition(|(code, _)| *code >= 1000);
        self.pairs(head);

        match &entity.geometry {
            Geometry::Line(line) => {
                self.pair(100, "AcDbLine");
                self.point(10, line.start);
                self.point(11, line.end);
            }
            Geometry::Circle(circle) => {
                self.pair(100, "AcDbCircle");
                self.point(10, circle.center);
                self.float(40, circle.radius);
            }
            Geometry::Arc(arc) => {
                self.pair(100, "AcDbCircle");
                self.point(10, arc.center);
                self.float(40, arc.radius);
                self.pair(100, "AcDbArc");
                self.float(50, arc.start_angle);
                self.float(51, arc.end_angle);
            }
            Geometry::Ellipse(ellipse) => {
                self.pair(100, "AcDbEllipse");
                self.point(10, ellipse.center);
                self.vector(11, ellipse.major_axis);
                self.float(40, ellipse.ratio);
                self.float(41, ellipse.start_parameter);
                self.float(42, ellipse.end_parameter);
            }
            Geometry::Polyline(polyline) => self.polyline(polyline),
            Geometry::Text(text) => self.text(text),
            Geometry::MText(mtext) => self.mtext(mtext),
            Geometry::GroupReference(reference) => self.group_reference(reference),
            Geometry::Opaque(_) => {}
        }
        if let Some(extrusion) = entity.extrusion {
            self.vector(210, extrusion);
        }
        self.pairs(subclass);
        self.pairs(extended);
        if let Geometry::GroupReference(reference) = &entity.geometry {
            self.nested(&reference.attributes, &handle);
        }
    }

    fn pairs<'p>(&mut self, pairs: impl IntoIterator<Item = &'p Pair>) {
        for (code, value) in pairs {
            self.pair(*code, value);
        }
    }

    /// 写出从属记录序列（ATTRIB、VERTEX、SEQEND），每个记录分配句柄并归属于 `owner`。
    fn nested(&mut self, pairs: &[Pair], owner: &str) {
        for (code, value) in pairs {
            if *code == 0 {
                self.begin_record(value, owner);
            } else {
                self.pair(*code, value);
            }
        }
    }

    fn polyline(&mut self, polyline: &Polyline) {
        self.pair(100, "AcDbPolyline");
        self.pair(90, polyline.vertices.len());
        self.pair(70, if polyline.is_closed { 1 } else { 0 });
        if let Some(width) = polyline.constant_width {
            self.float(43, width);
        }
        if !is_positive_zero(polyline.elevation) {
            self.float(38, polyline.elevation);
        }
        for vertex in &polyline.vertices {
            self.float(10, vertex.position.x());
            self.float(20, vertex.position.y());
            if let Some(width) = vertex.start_width {
                self.float(40, width);
            }
            if let Some(width) = vertex.end_width {
                self.float(41, width);
            }
            if !is_positive_zero(vertex.bulge) {
                self.float(42, vertex.bulge);
            }
        }
    }

    fn text(&mut self, text: &Text) {
        self.pair(100, "AcDbText");
        self.point(10, text.insert);
        self.float(40, text.height);
        self.pair(1, &text.content);
        if !is_positive_zero(text.rotation) {
            self.float(50, text.rotation);
        }
        if let Some(width_factor) = text.width_factor {
            self.float(41, width_factor);
        }
        if let Some(style) = &text.style {
            self.pair(7, style);
        }
        if text.horizontal_align != 0 {
            self.pair(72, text.horizontal_align);
        }
        if let Some(alignment) = text.alignment {
            self.point(11, alignment);
        }
        self.pair(100, "AcDbText");
        if text.vertical_align != 0 {
            self.pair(73, text.vertical_align);
        }
    }

    fn mtext(&mut self, mtext: &MText) {
        self.pair(100, "AcDbMText");
        self.point(10, mtext.insert);
        self.float(40, mtext.height);
        if let Some(width) = mtext.reference_width {
            self.float(41, width);
        }
        self.pair(71, mtext.attachment_point);
        self.pair(72, mtext.drawing_direction);
        let chars: Vec<char> = mtext.content.chars().collect();
        let mut chunks: Vec<String> = chars
            .chunks(MTEXT_CHUNK)
            .map(|chunk| chunk.iter().collect())
            .collect();
        let tail = chunks.pop().unwrap_or_default();
        for chunk in &chunks {
            self.pair(3, chunk);
        }
        self.pair(1, tail);
        if let Some(style) = &mtext.style {
            self.pair(7, style);
        }
        if let Some(direction) = mtext.direction {
            self.vector(11, direction);
        }
        if let Some(rotation) = mtext.rotation {
            self.float(50, rotation);
        }
    }

    fn group_reference(&mut self, reference: &GroupReference) {
        self.pair(100, "AcDbBlockReference");
        if !reference.attributes.is_empty() {
            self.pair(66, 1);
        }
        self.pair(2, &reference.group);
        self.point(10, reference.insert);
        self.float(41, reference.scale.x());
        self.float(42, reference.scale.y());
        self.float(43, reference.scale.z());
        self.float(50, reference.rotation);
    }

    /// 原样写出未建模记录，只替换头部区域中的图层、颜色与线型为实体当前值。
    /// 嵌套的从属记录重新分配句柄。
    fn opaque(&mut self, entity: &Entity, opaque: &OpaqueEntity, owner: &str) {
        let head_end = head_region_end(&opaque.pairs);
        let head = &opaque.pairs[..head_end];
        let present = |code: i32| head.iter().any(|(candidate, _)| *candidate == code);

        let handle = self.begin_record(&opaque.kind, owner);
        if !present(8) {
            self.pair(8, &entity.layer);
        }
        if !present(62) {
            if let Some(color) = entity.color {
                self.pair(62, color);
            }
        }
        if !present(6) {
            if let Some(line_style) = &entity.line_style {
                self.pair(6, line_style);
            }
        }

        let (mut layer_done, mut color_done, mut line_style_done) = (false, false, false);
        for (index, (code, value)) in opaque.pairs.iter().enumerate() {
            if index < head_end {
                match code {
                    8 if !layer_done => {
                        layer_done = true;
                        self.pair(8, &entity.layer);
                        continue;
                    }
                    62 if !color_done => {
                        color_done = true;
                        if let Some(color) = entity.color {
                            self.pair(62, color);
                        }
                        continue;
                    }
                    6 if !line_style_done => {
                        line_style_done = true;
                        if let Some(line_style) = &entity.line_style {
                            self.pair(6, line_style);
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            if *code == 0 {
                self.begin_record(value, &handle);
            } else {
                self.pair(*code, value);
            }
        }
    }
}

#[inline]
fn is_positive_zero(value: f64) -> bool {
    value.to_bits() == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use dxfmerge_core::entity::PolylineVertex;
    use dxfmerge_core::geometry::Point2;

    fn render(entity: &Entity) -> String {
        let mut writer = DxfWriter::default();
        writer.entity(entity, "1F");
        writer.out
    }

    /// 按组码 0 切分出的记录。
    fn records(out: &str) -> Vec<Vec<(i32, String)>> {
        let lines: Vec<&str> = out.lines().collect();
        let mut records: Vec<Vec<(i32, String)>> = Vec::new();
        for pair in lines.chunks(2) {
            let code: i32 = pair[0].trim().parse().unwrap();
            if code == 0 {
                records.push(Vec::new());
            }
            records.last_mut().unwrap().push((code, pair[1].to_string()));
        }
        records
    }

    fn value(record: &[(i32, String)], code: i32) -> Option<&str> {
        record
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, value)| value.as_str())
    }

    fn find<'r>(
        records: &'r [Vec<(i32, String)>],
        kind: &str,
        code: i32,
        expected: &str,
    ) -> &'r [(i32, String)] {
        records
            .iter()
            .find(|record| record[0].1 == kind && value(record, code) == Some(expected))
            .unwrap_or_else(|| panic!("missing {kind} with {code}={expected}"))
    }

    fn sample_document() -> Document {
        let mut document = Document::new();
        document.ensure_layer("WALLS");
        let mut door = Group::new("DOOR");
        door.entities.push(Entity::line(
            "WALLS",
            Point3::origin(),
            Point3::new(0.9, 0.0, 0.0),
        ));
        document.groups_mut().insert_if_absent(door).unwrap();
        document
            .groups_mut()
            .insert_if_absent(Group::new("*Model_Space"))
            .unwrap();
        document.add_entity(Entity::circle("WALLS", Point3::new(3.0, 4.0, 0.0), 1.0));
        document.add_entity(Entity::group_reference("WALLS", "DOOR", Point3::origin()));
        document
    }

    #[test]
    fn handles_are_unique_and_below_the_seed() {
        let out = write_document(&sample_document());
        let records = records(&out);

        let header = &records[0];
        let seed_index = header
            .iter()
            .position(|pair| *pair == (9, "$HANDSEED".to_string()))
            .expect("$HANDSEED");
        let seed = u64::from_str_radix(&header[seed_index + 1].1, 16).unwrap();

        let mut seen = HashSet::new();
        for record in &records[1..] {
            for (code, value) in record {
                if matches!(code, 5 | 105) {
                    let handle = u64::from_str_radix(value, 16).unwrap();
                    assert!(handle > 0 && handle < seed, "handle {value} vs seed {seed:X}");
                    assert!(seen.insert(handle), "duplicate handle {value}");
                }
            }
        }
        assert!(seen.len() > 10);
    }

    #[test]
    fn entities_are_owned_by_their_block_record() {
        let out = write_document(&sample_document());
        let records = records(&out);

        let model = value(find(&records, "BLOCK_RECORD", 2, "*Model_Space"), 5).unwrap();
        let door = value(find(&records, "BLOCK_RECORD", 2, "DOOR"), 5).unwrap();
        find(&records, "BLOCK_RECORD", 2, "*Paper_Space");

        assert_eq!(value(find(&records, "CIRCLE", 8, "WALLS"), 330), Some(model));
        assert_eq!(value(find(&records, "LINE", 8, "WALLS"), 330), Some(door));
        assert_eq!(value(find(&records, "BLOCK", 2, "DOOR"), 330), Some(door));

        // 布局块只写一次
        let model_blocks = records
            .iter()
            .filter(|record| record[0].1 == "BLOCK" && value(record, 2) == Some("*Model_Space"))
            .count();
        assert_eq!(model_blocks, 1);
        find(&records, "BLOCK", 2, "*Paper_Space");
        assert!(out.contains("  0\nSECTION\n  2\nOBJECTS\n  0\nDICTIONARY\n"));
        assert!(out.ends_with("  0\nEOF\n"));
    }

    #[test]
    fn attributes_get_handles_owned_by_the_insert() {
        let mut reference = GroupReference::new("DOOR", Point3::origin());
        reference.attributes = vec![
            (0, "ATTRIB".to_string()),
            (100, "AcDbEntity".to_string()),
            (8, "0".to_string()),
            (100, "AcDbText".to_string()),
            (1, "D-01".to_string()),
            (0, "SEQEND".to_string()),
            (100, "AcDbEntity".to_string()),
            (8, "0".to_string()),
        ];
        let entity = Entity::new("0", Geometry::GroupReference(reference));
        let records = records(&render(&entity));

        let kinds: Vec<&str> = records.iter().map(|record| record[0].1.as_str()).collect();
        assert_eq!(kinds, ["INSERT", "ATTRIB", "SEQEND"]);
        assert_eq!(value(&records[0], 5), Some("1"));
        assert_eq!(value(&records[0], 330), Some("1F"));
        for record in &records[1..] {
            assert_eq!(record[1].0, 5);
            assert_eq!(value(record, 330), Some("1"));
        }
        assert_eq!(value(&records[1], 5), Some("2"));
        assert_eq!(value(&records[2], 5), Some("3"));
    }

    #[test]
    fn floats_use_shortest_round_trip_form() {
        let mut writer = DxfWriter::default();
        writer.float(10, 0.1 + 0.2);
        writer.float(20, -0.0);
        writer.float(30, 1e-300);
        assert_eq!(writer.out, " 10\n0.30000000000000004\n 20\n-0.0\n 30\n1e-300\n");
    }

    #[test]
    fn opaque_record_gets_current_layer_in_place() {
        let mut entity = Entity::new(
            "SOURCE_A",
            Geometry::Opaque(OpaqueEntity {
                kind: "HATCH".to_string(),
                pairs: vec![
                    (100, "AcDbEntity".to_string()),
                    (8, "OLD".to_string()),
                    (6, "DASHED".to_string()),
                    (100, "AcDbHatch".to_string()),
                    (8, "NOT_A_LAYER".to_string()),
                ],
            }),
        );
        entity.line_style = None;
        let out = render(&entity);
        assert_eq!(
            out,
            concat!(
                "  0\nHATCH\n  5\n1\n330\n1F\n",
                "100\nAcDbEntity\n  8\nSOURCE_A\n100\nAcDbHatch\n  8\nNOT_A_LAYER\n",
            )
        );
    }

    #[test]
    fn polyline_keeps_negative_zero_elevation() {
        let entity = Entity::new(
            "0",
            Geometry::Polyline(Polyline {
                vertices: vec![PolylineVertex::new(Point2::new(1.0, 2.0))],
                is_closed: false,
                elevation: -0.0,
                constant_width: None,
            }),
        );
        let out = render(&entity);
        assert!(out.contains(" 38\n-0.0\n"));
        assert!(!out.contains(" 42\n"));
    }

    #[test]
    fn long_mtext_is_chunked() {
        let content = "x".repeat(MTEXT_CHUNK * 2 + 3);
        let entity = Entity::new(
            "0",
            Geometry::MText(MText {
                insert: Point3::origin(),
                content,
                height: 2.5,
                reference_width: None,
                attachment_point: 1,
                drawing_direction: 1,
                direction: None,
                rotation: None,
                style: None,
            }),
        );
        let out = render(&entity);
        assert_eq!(out.matches("  3\n").count(), 2);
        assert!(out.contains("  1\nxxx\n"));
    }
}
