use std::convert::TryFrom;
use std::f64::consts::TAU;

use dxfmerge_core::entity::{
    Arc, Circle, Ellipse, GroupReference, Line, MText, OpaqueEntity, Polyline, PolylineVertex,
    Text,
};
use dxfmerge_core::geometry::{Point2, Point3, Vector3};
use dxfmerge_core::resources::{DEFAULT_LAYER, Group, LayerDef, LineStyleDef, TextStyleDef};
use dxfmerge_core::{Document, Entity, Geometry, Registry, Resource};
use tracing::{debug, warn};

pub(crate) type Pair = (i32, String);

/// POLYLINE 标志位：3D 多段线、3D 网格、多面网格。带任一标志的多段线按原始记录保留。
const NON_PLANAR_POLYLINE_FLAGS: i16 = 8 | 16 | 64;
/// VERTEX 标志位：样条框架控制点，不属于可见轮廓。
const SPLINE_FRAME_VERTEX: i16 = 16;

#[derive(Debug)]
pub(crate) enum DxfError {
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

pub(crate) struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::blank();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "TABLES" => self.parse_tables(&mut document)?,
                        "BLOCKS" => self.parse_blocks(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        document.ensure_layer(DEFAULT_LAYER);
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut variable: Option<String> = None;
        let mut base: [Option<f64>; 3] = [None; 3];
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => variable = Some(name.trim().to_string()),
                Some((code @ (10 | 20 | 30), value)) if variable.as_deref() == Some("$INSBASE") => {
                    let axis = (code / 10 - 1) as usize;
                    base[axis] = Some(parse_f64(&value, "$INSBASE 坐标")?);
                }
                Some(_) => {}
                None => return Err(DxfError::invalid("HEADER 段未找到 ENDSEC 终止标记")),
            }
        }
        if let [Some(x), Some(y), z] = base {
            document.set_insertion_base(Point3::new(x, y, z.unwrap_or(0.0)));
        }
        Ok(())
    }

    fn parse_tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let kind = self.next_record("TABLES 段")?;
            match kind.as_str() {
                "ENDSEC" => break,
                "TABLE" => self.parse_table(document)?,
                other => {
                    return Err(DxfError::invalid(format!(
                        "TABLES 段遇到意外的记录 {other}（期望 TABLE）"
                    )));
                }
            }
        }
        Ok(())
    }

    fn parse_table(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let header = self.read_body()?;
        let table = header
            .iter()
            .find(|(code, _)| *code == 2)
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default();
        loop {
            let kind = self.next_record(&format!("表 {table}"))?;
            if kind == "ENDTAB" {
                self.read_body()?;
                break;
            }
            let body = self.read_body()?;
            match table.as_str() {
                "LAYER" => register(document.layers_mut(), layer_from_pairs(&body)?, "图层"),
                "LTYPE" => register(
                    document.line_styles_mut(),
                    line_style_from_pairs(&body)?,
                    "线型",
                ),
                "STYLE" => {
                    if let Some(style) = text_style_from_pairs(&body)? {
                        register(document.text_styles_mut(), style, "文字样式");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_blocks(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let kind = self.next_record("BLOCKS 段")?;
            match kind.as_str() {
                "ENDSEC" => break,
                "BLOCK" => self.parse_block(document)?,
                other => {
                    debug!(record = other, "BLOCKS 段跳过块定义之外的记录");
                    self.read_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_block(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut fields = FieldReader::new(strip_bookkeeping(self.read_body()?));
        let name = fields
            .take_name(2)
            .or_else(|| fields.take_name(3))
            .unwrap_or_default();
        let mut group = Group::new(name);
        group.base_point = fields
            .take_point(10, "BLOCK 基点")?
            .unwrap_or_else(Point3::origin);
        loop {
            let kind = self.next_record(&format!("块 {}", group.name))?;
            if kind == "ENDBLK" {
                self.read_body()?;
                break;
            }
            if let Some(parsed) = self.parse_entity(&kind)? {
                group.entities.push(parsed.entity);
            }
        }
        if group.is_layout() {
            debug!(name = %group.name, entities = group.entities.len(), "跳过布局块");
            return Ok(());
        }
        register(document.groups_mut(), group, "块");
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let kind = self.next_record("ENTITIES 段")?;
            if kind == "ENDSEC" {
                break;
            }
            match self.parse_entity(&kind)? {
                Some(parsed) if parsed.paper_space => {
                    debug!(record = %kind, layer = %parsed.entity.layer, "跳过图纸空间实体");
                }
                Some(parsed) => document.add_entity(parsed.entity),
                None => {}
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Option<ParsedEntity>, DxfError> {
        match kind {
            "POLYLINE" => self.parse_polyline().map(Some),
            "INSERT" => self.parse_insert().map(Some),
            "VERTEX" | "SEQEND" | "ATTRIB" => {
                debug!(record = kind, "跳过游离的从属记录");
                self.read_body()?;
                Ok(None)
            }
            _ => {
                let body = strip_bookkeeping(self.read_body()?);
                let paper_space = in_paper_space(&body);
                let entity = build_entity(kind, body)?;
                Ok(Some(ParsedEntity {
                    entity,
                    paper_space,
                }))
            }
        }
    }

    fn parse_polyline(&mut self) -> Result<ParsedEntity, DxfError> {
        let header = strip_bookkeeping(self.read_body()?);
        let paper_space = in_paper_space(&header);
        let mut vertices: Vec<Vec<Pair>> = Vec::new();
        let mut seqend: Vec<Pair> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "VERTEX" => {
                    vertices.push(strip_bookkeeping(self.read_body()?));
                }
                Some((0, value)) if value.trim() == "SEQEND" => {
                    seqend = strip_bookkeeping(self.read_body()?);
                    break;
                }
                Some(pair) => {
                    warn!("POLYLINE 缺少 SEQEND，已在下一个记录处截断");
                    self.reader.put_back(pair);
                    break;
                }
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        let mut fields = FieldReader::new(header.clone());
        let head = fields.take_common()?;
        let flags = fields.take_i16(70, "POLYLINE 标志（组码 70）")?.unwrap_or(0);
        if flags & NON_PLANAR_POLYLINE_FLAGS != 0 {
            let mut pairs = header;
            for vertex in vertices {
                pairs.push((0, "VERTEX".to_string()));
                pairs.extend(vertex);
            }
            pairs.push((0, "SEQEND".to_string()));
            pairs.extend(seqend);
            return Ok(ParsedEntity {
                entity: head.into_entity(Geometry::Opaque(OpaqueEntity {
                    kind: "POLYLINE".to_string(),
                    pairs,
                })),
                paper_space,
            });
        }

        fields.take_raw(66);
        let elevation = fields
            .take_point(10, "POLYLINE 基准点")?
            .map_or(0.0, |point| point.z());
        let default_start = fields.take_f64(40, "POLYLINE 起始宽度")?;
        let default_end = fields.take_f64(41, "POLYLINE 终止宽度")?;
        let constant_width = match (default_start, default_end) {
            (Some(start), None) => Some(start),
            (Some(start), Some(end)) if start.to_bits() == end.to_bits() => Some(start),
            _ => None,
        };
        let mut polyline = Polyline {
            vertices: Vec::with_capacity(vertices.len()),
            is_closed: flags & 1 != 0,
            elevation,
            constant_width,
        };
        for (index, pairs) in vertices.into_iter().enumerate() {
            let mut vertex_fields = FieldReader::new(pairs);
            let vertex_flags = vertex_fields
                .take_i16(70, "VERTEX 标志（组码 70）")?
                .unwrap_or(0);
            if vertex_flags & SPLINE_FRAME_VERTEX != 0 {
                continue;
            }
            let position = vertex_fields
                .take_point(10, "VERTEX 坐标")?
                .ok_or_else(|| DxfError::invalid(format!("POLYLINE 顶点 {index} 缺少坐标")))?;
            let mut vertex = PolylineVertex::with_bulge(
                position.xy(),
                vertex_fields.take_f64(42, "VERTEX 凸度")?.unwrap_or(0.0),
            );
            if constant_width.is_none() {
                vertex.start_width = vertex_fields
                    .take_f64(40, "VERTEX 起始宽度")?
                    .or(default_start);
                vertex.end_width = vertex_fields
                    .take_f64(41, "VERTEX 终止宽度")?
                    .or(default_end);
            }
            polyline.vertices.push(vertex);
        }

        let extrusion = fields.take_vector(210, "POLYLINE 拉伸方向")?;
        let mut entity = head.into_entity(Geometry::Polyline(polyline));
        entity.extrusion = extrusion;
        entity.extra_pairs = fields
            .into_extra()
            .into_iter()
            .filter(|(code, _)| is_portable_code(*code))
            .collect();
        Ok(ParsedEntity {
            entity,
            paper_space,
        })
    }

    fn parse_insert(&mut self) -> Result<ParsedEntity, DxfError> {
        let body = strip_bookkeeping(self.read_body()?);
        let paper_space = in_paper_space(&body);
        let mut fields = FieldReader::new(body);
        let head = fields.take_common()?;
        let attributes_follow = fields.take_i16(66, "INSERT 属性标志（组码 66）")? == Some(1);
        let group = fields.take_name(2).unwrap_or_default();
        let insert = fields
            .take_point(10, "INSERT 插入点")?
            .unwrap_or_else(Point3::origin);
        let mut reference = GroupReference::new(group, insert);
        reference.scale = Vector3::new(
            fields.take_f64(41, "INSERT X 比例")?.unwrap_or(1.0),
            fields.take_f64(42, "INSERT Y 比例")?.unwrap_or(1.0),
            fields.take_f64(43, "INSERT Z 比例")?.unwrap_or(1.0),
        );
        reference.rotation = fields.take_f64(50, "INSERT 旋转角")?.unwrap_or(0.0);

        if attributes_follow {
            loop {
                match self.reader.next_pair()? {
                    Some((0, value)) if value.trim() == "ATTRIB" => {
                        reference.attributes.push((0, "ATTRIB".to_string()));
                        reference
                            .attributes
                            .extend(strip_bookkeeping(self.read_body()?));
                    }
                    Some((0, value)) if value.trim() == "SEQEND" => {
                        reference.attributes.push((0, "SEQEND".to_string()));
                        reference
                            .attributes
                            .extend(strip_bookkeeping(self.read_body()?));
                        break;
                    }
                    Some(pair) => {
                        warn!(group = %reference.group, "INSERT 属性序列缺少 SEQEND");
                        self.reader.put_back(pair);
                        reference.attributes.push((0, "SEQEND".to_string()));
                        break;
                    }
                    None => return Err(DxfError::invalid("INSERT 属性序列未正确结束")),
                }
            }
        }

        let extrusion = fields.take_vector(210, "INSERT 拉伸方向")?;
        let mut entity = head.into_entity(Geometry::GroupReference(reference));
        entity.extrusion = extrusion;
        entity.extra_pairs = fields.into_extra();
        Ok(ParsedEntity {
            entity,
            paper_space,
        })
    }

    /// 读取当前记录余下的组码，直到下一个 0 组码（不消费该组码）。
    fn read_body(&mut self) -> Result<Vec<Pair>, DxfError> {
        let mut pairs = Vec::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 0 {
                self.reader.put_back((code, value));
                break;
            }
            pairs.push((code, value));
        }
        Ok(pairs)
    }

    fn next_record(&mut self, context: &str) -> Result<String, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => Ok(value.trim().to_string()),
            Some((code, _)) => Err(DxfError::invalid(format!(
                "{context} 遇到组码 {code}（期望 0 表示记录起始）"
            ))),
            None => Err(DxfError::invalid(format!("{context} 提前结束"))),
        }
    }
}

fn build_entity(kind: &str, pairs: Vec<Pair>) -> Result<Entity, DxfError> {
    let mut fields = FieldReader::new(pairs);
    let head = fields.take_common()?;
    let geometry = match kind {
        "LINE" => Geometry::Line(Line {
            start: fields.require_point(10, "LINE 起点")?,
            end: fields.require_point(11, "LINE 终点")?,
        }),
        "CIRCLE" => Geometry::Circle(Circle {
            center: fields.require_point(10, "CIRCLE 圆心")?,
            radius: fields.require_f64(40, "CIRCLE 半径")?,
        }),
        "ARC" => Geometry::Arc(Arc {
            center: fields.require_point(10, "ARC 圆心")?,
            radius: fields.require_f64(40, "ARC 半径")?,
            start_angle: fields.require_f64(50, "ARC 起始角")?,
            end_angle: fields.require_f64(51, "ARC 终止角")?,
        }),
        "ELLIPSE" => Geometry::Ellipse(Ellipse {
            center: fields.require_point(10, "ELLIPSE 圆心")?,
            major_axis: {
                let axis = fields.require_point(11, "ELLIPSE 主轴")?;
                Vector3::new(axis.x(), axis.y(), axis.z())
            },
            ratio: fields.require_f64(40, "ELLIPSE 轴比")?,
            start_parameter: fields.take_f64(41, "ELLIPSE 起始参数")?.unwrap_or(0.0),
            end_parameter: fields.take_f64(42, "ELLIPSE 终止参数")?.unwrap_or(TAU),
        }),
        "LWPOLYLINE" => {
            let flags = fields.take_i16(70, "LWPOLYLINE 标志（组码 70）")?.unwrap_or(0);
            let elevation = fields.take_f64(38, "LWPOLYLINE 标高")?.unwrap_or(0.0);
            let constant_width = fields.take_f64(43, "LWPOLYLINE 全局宽度")?;
            fields.take_raw(90);
            Geometry::Polyline(Polyline {
                vertices: fields.take_lw_vertices()?,
                is_closed: flags & 1 != 0,
                elevation,
                constant_width,
            })
        }
        "TEXT" => Geometry::Text(Text {
            insert: fields.require_point(10, "TEXT 插入点")?,
            height: fields.require_f64(40, "TEXT 高度")?,
            content: fields.take_raw(1).unwrap_or_default(),
            rotation: fields.take_f64(50, "TEXT 旋转角")?.unwrap_or(0.0),
            style: fields.take_name(7),
            width_factor: fields.take_f64(41, "TEXT 宽度因子")?,
            alignment: fields.take_point(11, "TEXT 对齐点")?,
            horizontal_align: fields.take_i16(72, "TEXT 水平对齐（组码 72）")?.unwrap_or(0),
            vertical_align: fields.take_i16(73, "TEXT 垂直对齐（组码 73）")?.unwrap_or(0),
        }),
        "MTEXT" => {
            let mut content: String = fields.take_all_raw(3).concat();
            if let Some(tail) = fields.take_raw(1) {
                content.push_str(&tail);
            }
            Geometry::MText(MText {
                insert: fields.require_point(10, "MTEXT 插入点")?,
                content,
                height: fields.require_f64(40, "MTEXT 高度")?,
                reference_width: fields.take_f64(41, "MTEXT 参考宽度")?,
                attachment_point: fields.take_i16(71, "MTEXT 附着点（组码 71）")?.unwrap_or(1),
                drawing_direction: fields
                    .take_i16(72, "MTEXT 书写方向（组码 72）")?
                    .unwrap_or(1),
                direction: fields.take_vector(11, "MTEXT 方向向量")?,
                rotation: fields.take_f64(50, "MTEXT 旋转角")?,
                style: fields.take_name(7),
            })
        }
        _ => {
            return Ok(head.into_entity(Geometry::Opaque(OpaqueEntity {
                kind: kind.to_string(),
                pairs: fields.into_pairs(),
            })));
        }
    };
    let extrusion = fields.take_vector(210, &format!("{kind} 拉伸方向"))?;
    let mut entity = head.into_entity(geometry);
    entity.extrusion = extrusion;
    entity.extra_pairs = fields.into_extra();
    Ok(entity)
}

fn register<T: Resource>(registry: &mut Registry<T>, definition: T, label: &str) {
    let name = definition.name().to_string();
    match registry.insert_if_absent(definition) {
        Ok(true) => {}
        Ok(false) => debug!(name = %name, "重复的{label}定义，保留首个"),
        Err(err) => warn!(name = %name, error = %err, "跳过不合法的{label}定义"),
    }
}

fn layer_from_pairs(pairs: &[Pair]) -> Result<LayerDef, DxfError> {
    let mut layer = LayerDef::new("");
    let mut flags = 0;
    for (code, value) in pairs {
        match code {
            2 => layer.name = value.trim().to_string(),
            62 => {
                let color = parse_i16(value, "图层颜色（组码 62）")?;
                layer.is_on = color >= 0;
                layer.color = color.saturating_abs();
            }
            6 if !value.trim().is_empty() => layer.line_style = value.trim().to_string(),
            370 => layer.line_weight = parse_i16(value, "图层线宽（组码 370）")?,
            70 => flags = parse_i16(value, "图层标志（组码 70）")?,
            _ => {}
        }
    }
    layer.is_frozen = flags & 1 != 0;
    layer.is_locked = flags & 4 != 0;
    Ok(layer)
}

fn line_style_from_pairs(pairs: &[Pair]) -> Result<LineStyleDef, DxfError> {
    let mut style = LineStyleDef::new("");
    for (code, value) in pairs {
        match code {
            2 => style.name = value.trim().to_string(),
            3 => style.description = value.clone(),
            49 => style.pattern.push(parse_f64(value, "线型线段长度（组码 49）")?),
            _ => {}
        }
    }
    Ok(style)
}

/// 形文件条目（标志位 1）不是文字样式，返回 `None`。
fn text_style_from_pairs(pairs: &[Pair]) -> Result<Option<TextStyleDef>, DxfError> {
    let mut style = TextStyleDef::new("");
    for (code, value) in pairs {
        match code {
            2 => style.name = value.trim().to_string(),
            3 if !value.trim().is_empty() => style.font = value.trim().to_string(),
            40 => style.height = parse_f64(value, "文字样式高度（组码 40）")?,
            41 => style.width = parse_f64(value, "文字样式宽度因子（组码 41）")?,
            50 => style.oblique = parse_f64(value, "文字样式倾斜角（组码 50）")?,
            70 => {
                if parse_i16(value, "文字样式标志（组码 70）")? & 1 != 0 {
                    return Ok(None);
                }
            }
            _ => {}
        }
    }
    Ok(Some(style))
}

/// 记录头部区域的结束位置：第二个子类标记（组码 100）或首个嵌套记录（组码 0）之前。
/// 图层、颜色、线型与簿记组码只在这一区域内解释。
pub(crate) fn head_region_end(pairs: &[Pair]) -> usize {
    let mut markers = 0;
    for (index, (code, _)) in pairs.iter().enumerate() {
        match code {
            0 => return index,
            100 => {
                markers += 1;
                if markers == 2 {
                    return index;
                }
            }
            _ => {}
        }
    }
    pairs.len()
}

/// 去掉头部区域里的句柄、所有者指针与 `{...}` 应用组。
fn strip_bookkeeping(pairs: Vec<Pair>) -> Vec<Pair> {
    let head_end = head_region_end(&pairs);
    let mut kept = Vec::with_capacity(pairs.len());
    let mut depth = 0usize;
    for (index, (code, value)) in pairs.into_iter().enumerate() {
        if index < head_end {
            if code == 102 {
                let marker = value.trim();
                if marker.starts_with('{') {
                    depth += 1;
                    continue;
                }
                if marker == "}" {
                    depth = depth.saturating_sub(1);
                    continue;
                }
            }
            if depth > 0 || matches!(code, 5 | 330 | 360) {
                continue;
            }
        }
        kept.push((code, value));
    }
    kept
}

/// 头部区域中组码 67 为 1 的实体属于图纸空间布局。
fn in_paper_space(pairs: &[Pair]) -> bool {
    pairs[..head_region_end(pairs)]
        .iter()
        .any(|(code, value)| *code == 67 && value.trim() == "1")
}

/// 由 POLYLINE 转为轻量多段线后仍然有意义的附加组码。
fn is_portable_code(code: i32) -> bool {
    matches!(code, 39 | 48 | 60 | 370 | 420 | 430 | 440) || code >= 1000
}

struct ParsedEntity {
    entity: Entity,
    paper_space: bool,
}

struct RecordHead {
    layer: String,
    color: Option<i16>,
    line_style: Option<String>,
}

impl RecordHead {
    fn into_entity(self, geometry: Geometry) -> Entity {
        let mut entity = Entity::new(self.layer, geometry);
        entity.color = self.color;
        entity.line_style = self.line_style;
        entity
    }
}

/// 按组码取值的记录视图。每个组码值只能被取走一次，剩余部分成为附加组码。
struct FieldReader {
    pairs: Vec<Pair>,
    used: Vec<bool>,
}

impl FieldReader {
    fn new(pairs: Vec<Pair>) -> Self {
        let used = vec![false; pairs.len()];
        Self { pairs, used }
    }

    fn take_within(&mut self, code: i32, end: usize) -> Option<String> {
        let position = self.pairs[..end]
            .iter()
            .zip(&self.used)
            .position(|((candidate, _), used)| *candidate == code && !used)?;
        self.used[position] = true;
        Some(self.pairs[position].1.clone())
    }

    fn take_raw(&mut self, code: i32) -> Option<String> {
        self.take_within(code, self.pairs.len())
    }

    fn take_all_raw(&mut self, code: i32) -> Vec<String> {
        let mut values = Vec::new();
        while let Some(value) = self.take_raw(code) {
            values.push(value);
        }
        values
    }

    fn take_name(&mut self, code: i32) -> Option<String> {
        self.take_raw(code)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn take_f64(&mut self, code: i32, context: &str) -> Result<Option<f64>, DxfError> {
        self.take_raw(code)
            .map(|value| parse_f64(&value, context))
            .transpose()
    }

    fn require_f64(&mut self, code: i32, context: &str) -> Result<f64, DxfError> {
        self.take_f64(code, context)?
            .ok_or_else(|| DxfError::invalid(format!("{context} 缺失（组码 {code}）")))
    }

    fn take_i16(&mut self, code: i32, context: &str) -> Result<Option<i16>, DxfError> {
        self.take_raw(code)
            .map(|value| parse_i16(&value, context))
            .transpose()
    }

    /// 读取 `base`、`base + 10`、`base + 20` 三个组码组成的点，Z 缺省为 0。
    fn take_point(&mut self, base: i32, context: &str) -> Result<Option<Point3>, DxfError> {
        let x = self.take_f64(base, context)?;
        let y = self.take_f64(base + 10, context)?;
        let z = self.take_f64(base + 20, context)?;
        match (x, y) {
            (None, None) => Ok(None),
            (Some(x), Some(y)) => Ok(Some(Point3::new(x, y, z.unwrap_or(0.0)))),
            _ => Err(DxfError::invalid(format!(
                "{context} 缺少完整的 XY 坐标（组码 {base}/{}）",
                base + 10
            ))),
        }
    }

    fn require_point(&mut self, base: i32, context: &str) -> Result<Point3, DxfError> {
        self.take_point(base, context)?
            .ok_or_else(|| DxfError::invalid(format!("{context} 缺失（组码 {base}）")))
    }

    fn take_vector(&mut self, base: i32, context: &str) -> Result<Option<Vector3>, DxfError> {
        Ok(self
            .take_point(base, context)?
            .map(|point| Vector3::new(point.x(), point.y(), point.z())))
    }

    /// 轻量多段线的顶点按出现顺序排列：每个 10 开启一个新顶点，其后的 20/40/41/42 属于它。
    fn take_lw_vertices(&mut self) -> Result<Vec<PolylineVertex>, DxfError> {
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut awaiting_y = false;
        for index in 0..self.pairs.len() {
            if self.used[index] {
                continue;
            }
            let (code, raw) = (self.pairs[index].0, self.pairs[index].1.as_str());
            let consumed = match code {
                10 => {
                    if awaiting_y {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少 Y 坐标（组码 20）"));
                    }
                    let x = parse_f64(raw, "LWPOLYLINE 顶点 X")?;
                    vertices.push(PolylineVertex::new(Point2::new(x, 0.0)));
                    awaiting_y = true;
                    true
                }
                20 => {
                    let vertex = vertices
                        .last_mut()
                        .filter(|_| awaiting_y)
                        .ok_or_else(|| DxfError::invalid("LWPOLYLINE 顶点 Y 坐标缺少对应的 X"))?;
                    let y = parse_f64(raw, "LWPOLYLINE 顶点 Y")?;
                    vertex.position = Point2::new(vertex.position.x(), y);
                    awaiting_y = false;
                    true
                }
                40 | 41 | 42 => match vertices.last_mut() {
                    Some(vertex) => {
                        let value = parse_f64(raw, "LWPOLYLINE 顶点属性")?;
                        match code {
                            40 => vertex.start_width = Some(value),
                            41 => vertex.end_width = Some(value),
                            _ => vertex.bulge = value,
                        }
                        true
                    }
                    None => false,
                },
                _ => false,
            };
            if consumed {
                self.used[index] = true;
            }
        }
        if awaiting_y {
            return Err(DxfError::invalid("LWPOLYLINE 顶点缺少 Y 坐标（组码 20）"));
        }
        Ok(vertices)
    }

    /// 取出头部区域的图层、颜色与线型。颜色 256 与线型 ByLayer 表示随层。
    fn take_common(&mut self) -> Result<RecordHead, DxfError> {
        let end = head_region_end(&self.pairs);
        let layer = self
            .take_within(8, end)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_LAYER.to_string());
        let color = match self.take_within(62, end) {
            Some(raw) => {
                let color = parse_i16(&raw, "实体颜色（组码 62）")?;
                (color != 256).then_some(color)
            }
            None => None,
        };
        let line_style = self
            .take_within(6, end)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("ByLayer"));
        Ok(RecordHead {
            layer,
            color,
            line_style,
        })
    }

    /// 未被取走的组码，去掉子类标记。
    fn into_extra(self) -> Vec<Pair> {
        self.pairs
            .into_iter()
            .zip(self.used)
            .filter(|((code, _), used)| !used && *code != 100)
            .map(|(pair, _)| pair)
            .collect()
    }

    /// 全部原始组码，用于按原样保存的记录。
    fn into_pairs(self) -> Vec<Pair> {
        self.pairs
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<Pair>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    /// 读取下一对组码/值，跳过 999 注释。
    fn next_pair(&mut self) -> Result<Option<Pair>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        loop {
            let code_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => return Ok(None),
            };
            if code_line.trim().is_empty() {
                continue;
            }

            let value_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => {
                    return Err(DxfError::invalid(format!(
                        "文件在第 {} 行结束，缺少与组码对应的值行",
                        self.line_number
                    )));
                }
            };

            let code = code_line.trim().parse::<i32>().map_err(|_| {
                DxfError::invalid(format!(
                    "第 {} 行的组码 \"{}\" 无法解析为整数",
                    self.line_number - 1,
                    code_line.trim()
                ))
            })?;
            if code == 999 {
                continue;
            }
            let value = value_line.trim_end_matches('\r').to_string();
            return Ok(Some((code, value)));
        }
    }

    fn put_back(&mut self, pair: Pair) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(i32, &str)]) -> Vec<Pair> {
        raw.iter()
            .map(|(code, value)| (*code, value.to_string()))
            .collect()
    }

    #[test]
    fn head_region_stops_at_second_subclass_marker() {
        let record = pairs(&[
            (5, "2A"),
            (100, "AcDbEntity"),
            (8, "WALLS"),
            (100, "AcDbHatch"),
            (62, "3"),
        ]);
        assert_eq!(head_region_end(&record), 3);
    }

    #[test]
    fn bookkeeping_is_stripped_from_head_only() {
        let record = pairs(&[
            (5, "2A"),
            (102, "{ACAD_REACTORS"),
            (330, "1F"),
            (102, "}"),
            (330, "1F"),
            (100, "AcDbEntity"),
            (8, "0"),
            (100, "AcDbHatch"),
            (97, "1"),
            (330, "3C"),
        ]);
        let stripped = strip_bookkeeping(record);
        assert_eq!(
            stripped,
            pairs(&[
                (100, "AcDbEntity"),
                (8, "0"),
                (100, "AcDbHatch"),
                (97, "1"),
                (330, "3C"),
            ])
        );
    }

    #[test]
    fn lw_vertices_keep_per_vertex_attributes() {
        let mut fields = FieldReader::new(pairs(&[
            (10, "0"),
            (20, "0"),
            (42, "0.5"),
            (10, "4"),
            (20, "1"),
            (40, "0.2"),
            (41, "0.3"),
        ]));
        let vertices = fields.take_lw_vertices().unwrap();
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].bulge, 0.5);
        assert_eq!(vertices[1].position, Point2::new(4.0, 1.0));
        assert_eq!(vertices[1].start_width, Some(0.2));
        assert_eq!(vertices[1].end_width, Some(0.3));
        assert!(fields.into_extra().is_empty());
    }

    #[test]
    fn common_fields_treat_by_layer_as_absent() {
        let mut fields = FieldReader::new(pairs(&[(8, " WALLS "), (62, "256"), (6, "BYLAYER")]));
        let head = fields.take_common().unwrap();
        assert_eq!(head.layer, "WALLS");
        assert_eq!(head.color, None);
        assert_eq!(head.line_style, None);
    }

    #[test]
    fn unknown_entity_keeps_every_pair() {
        let record = pairs(&[(8, "0"), (100, "AcDbEntity"), (100, "AcDbSpline"), (71, "3")]);
        let entity = build_entity("SPLINE", record.clone()).unwrap();
        match entity.geometry {
            Geometry::Opaque(opaque) => assert_eq!(opaque.pairs, record),
            other => panic!("unexpected geometry: {other:?}"),
        }
    }
}
