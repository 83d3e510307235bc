use dxfmerge_core::geometry::Point3;
use dxfmerge_core::registry::validate_name;
use dxfmerge_core::resources::{DEFAULT_LAYER, is_anonymous_name};
use dxfmerge_core::{Document, Entity, EntityCopyError, Group, ValidationError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollapseReport {
    /// 移入新组的实体数。
    pub moved: usize,
    /// 无法复制而被丢弃的实体，附带其原始位置。
    pub dropped: Vec<(usize, EntityCopyError)>,
}

/// 把文档的全部顶层实体收进一个命名组，并以原点处的单个组参照替代。
///
/// 同名组会先被删除；引用该名称的实体无法再解析，按复制失败丢弃。
pub fn collapse_to_group(
    document: &mut Document,
    name: &str,
) -> Result<CollapseReport, ValidationError> {
    validate_name(name)?;
    if is_anonymous_name(name) {
        return Err(ValidationError::AnonymousName(name.to_string()));
    }
    document.groups_mut().remove(name)?;

    let key = name.to_lowercase();
    let mut report = CollapseReport::default();
    let mut group = Group::new(name);
    for (index, entity) in document.entities().iter().enumerate() {
        let copied = entity.try_copy().and_then(|copy| {
            let refers_to_self = copy
                .group_name()
                .is_some_and(|target| target.to_lowercase() == key);
            if refers_to_self {
                Err(EntityCopyError::UnresolvedGroup {
                    name: name.to_string(),
                })
            } else {
                Ok(copy)
            }
        });
        match copied {
            Ok(copy) => group.entities.push(copy),
            Err(error) => report.dropped.push((index, error)),
        }
    }
    report.moved = group.entities.len();

    document.clear_entities();
    document.groups_mut().insert_if_absent(group)?;
    document.ensure_layer(DEFAULT_LAYER);
    document.add_entity(Entity::group_reference(DEFAULT_LAYER, name, Point3::origin()));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxfmerge_core::entity::{Geometry, OpaqueEntity};

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.ensure_layer("WALLS");
        doc.add_entity(Entity::line("WALLS", Point3::origin(), Point3::new(4.0, 0.0, 0.0)));
        doc.add_entity(Entity::circle("WALLS", Point3::new(2.0, 2.0, 0.0), 1.0));
        doc
    }

    #[test]
    fn collapse_moves_everything_into_one_reference() {
        let mut doc = sample();
        let original: Vec<Entity> = doc.entities().to_vec();

        let report = collapse_to_group(&mut doc, "level_1").unwrap();

        assert_eq!(report.moved, 2);
        assert!(report.dropped.is_empty());
        assert_eq!(doc.entity_count(), 1);
        assert_eq!(doc.entities()[0].group_name(), Some("level_1"));
        assert_eq!(doc.entities()[0].layer, "0");
        let group = doc.groups().get("level_1").unwrap();
        assert_eq!(group.entities, original);
        assert_eq!(group.base_point, Point3::origin());
    }

    #[test]
    fn collapse_replaces_existing_group() {
        let mut doc = sample();
        let mut stale = Group::new("LEVEL_1");
        stale.entities.push(Entity::circle("0", Point3::origin(), 9.0));
        doc.groups_mut().insert_if_absent(stale).unwrap();
        doc.add_entity(Entity::group_reference("0", "LEVEL_1", Point3::origin()));

        let report = collapse_to_group(&mut doc, "level_1").unwrap();

        assert_eq!(report.moved, 2);
        assert!(matches!(
            report.dropped.as_slice(),
            [(2, EntityCopyError::UnresolvedGroup { .. })]
        ));
        assert_eq!(doc.groups().len(), 1);
        assert_eq!(doc.groups().get("level_1").unwrap().name, "level_1");
    }

    #[test]
    fn collapse_drops_uncopyable_entities() {
        let mut doc = sample();
        doc.add_entity(Entity::new(
            "0",
            Geometry::Opaque(OpaqueEntity {
                kind: "ACAD_PROXY_ENTITY".to_string(),
                pairs: Vec::new(),
            }),
        ));
        let report = collapse_to_group(&mut doc, "plan").unwrap();
        assert_eq!(report.moved, 2);
        assert_eq!(report.dropped.len(), 1);
    }

    #[test]
    fn collapse_rejects_bad_names() {
        let mut doc = sample();
        assert_eq!(collapse_to_group(&mut doc, " "), Err(ValidationError::EmptyName));
        assert_eq!(
            collapse_to_group(&mut doc, "*U1"),
            Err(ValidationError::AnonymousName("*U1".to_string()))
        );
        assert!(matches!(
            collapse_to_group(&mut doc, "a/b"),
            Err(ValidationError::InvalidName { ch: '/', .. })
        ));
        assert_eq!(doc.entity_count(), 2);
    }
}
