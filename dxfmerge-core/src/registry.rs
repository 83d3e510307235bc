use std::collections::{HashMap, HashSet};

use crate::errors::ValidationError;

/// 匿名（内部生成）资源名称的前缀标记。
pub const ANONYMOUS_MARKER: char = '*';

/// DXF 表名中不允许出现的字符。
pub const FORBIDDEN_NAME_CHARS: [char; 11] = ['<', '>', '/', '\\', '"', ':', ';', '?', '|', '=', '`'];

/// 可登记在 [`Registry`] 中的具名资源。名称即键。
pub trait Resource: Clone {
    fn name(&self) -> &str;
}

/// 校验资源名称：不能为空，不能包含禁用字符，`*` 只允许作为首字符。
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    for (index, ch) in name.char_indices() {
        if FORBIDDEN_NAME_CHARS.contains(&ch) || (ch == ANONYMOUS_MARKER && index > 0) {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
                ch,
            });
        }
    }
    Ok(())
}

/// 以名称为键的资源表。
///
/// - 键不区分大小写，保留首个写入者的拼写；
/// - 只插入缺失条目，从不覆盖已有条目（先写者胜）；
/// - 预留条目在构造时写入，之后不可删除；
/// - 遍历顺序即插入顺序。
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
    reserved: HashSet<String>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            reserved: HashSet::new(),
        }
    }
}

impl<T: Resource> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以预留条目初始化。预留条目由调用方保证名称合法，不再校验。
    pub fn with_reserved<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            let key = key_of(definition.name());
            if registry.index.contains_key(&key) {
                continue;
            }
            registry.reserved.insert(key.clone());
            registry.index.insert(key, registry.entries.len());
            registry.entries.push(definition);
        }
        registry
    }

    /// 缺失时插入并返回 `true`；已存在时保持原条目不变并返回 `false`。
    pub fn insert_if_absent(&mut self, definition: T) -> Result<bool, ValidationError> {
        validate_name(definition.name())?;
        let key = key_of(definition.name());
        if self.index.contains_key(&key) {
            return Ok(false);
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(definition);
        Ok(true)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.index
            .get(&key_of(name))
            .map(|&position| &self.entries[position])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&key_of(name))
    }

    #[inline]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&key_of(name))
    }

    /// 删除非预留条目，返回被删除的定义。
    pub fn remove(&mut self, name: &str) -> Result<Option<T>, ValidationError> {
        let key = key_of(name);
        if self.reserved.contains(&key) {
            return Err(ValidationError::ReservedName(name.to_string()));
        }
        let Some(position) = self.index.remove(&key) else {
            return Ok(None);
        };
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(Some(removed))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

#[inline]
fn key_of(name: &str) -> String {
    name.to_lowercase()
}
