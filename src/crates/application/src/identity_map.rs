use domain::value::ExternalId;
use std::collections::HashMap;

/// 外部 ID -> 代理主键的映射，只在一次对账过程中有效
///
/// 每次对账各自持有实例，不在多次运行之间共享，也不做全局缓存。
#[derive(Debug, Clone)]
pub struct IdentityMap<K> {
    entries: HashMap<ExternalId, K>,
}

impl<K> Default for IdentityMap<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K> IdentityMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_surrogate(&mut self, external_id: ExternalId, key: K) {
        self.entries.insert(external_id, key);
    }

    pub fn lookup_surrogate(&self, external_id: &ExternalId) -> Option<&K> {
        self.entries.get(external_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
