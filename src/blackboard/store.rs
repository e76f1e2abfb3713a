//! 黑板存储：按写入顺序追加的条目日志
//!
//! 同名绑定以最后一次写入为准；子流程通过 view() 拿到父黑板的受限浅拷贝，
//! 只有其声明的输出绑定会被复制回父流程。

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::blackboard::Binding;

/// 黑板条目：绑定 + 值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub binding: Binding,
    pub value: Value,
}

/// 单个流程内的共享黑板（仅由引擎写入）
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    entries: Vec<Entry>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由初始绑定构造
    pub fn with_bindings(bindings: impl IntoIterator<Item = (Binding, Value)>) -> Self {
        let mut bb = Self::new();
        for (binding, value) in bindings {
            bb.bind(binding, value);
        }
        bb
    }

    /// 追加写入
    pub fn bind(&mut self, binding: Binding, value: Value) {
        self.entries.push(Entry { binding, value });
    }

    /// 按变量名取最新条目
    pub fn latest(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.binding.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.latest(name).map(|e| &e.value)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.latest(name).is_some()
    }

    /// 解析绑定：先按名且类型兼容；默认名的绑定再退回按类型查找最新条目
    pub fn resolve(&self, binding: &Binding) -> Option<&Entry> {
        if let Some(entry) = self.latest(&binding.name) {
            if binding.accepts(&entry.binding.type_name) {
                return Some(entry);
            }
        }
        if binding.uses_default_name() {
            return self
                .entries
                .iter()
                .rev()
                .find(|e| binding.accepts(&e.binding.type_name));
        }
        None
    }

    pub fn satisfies(&self, binding: &Binding) -> bool {
        self.resolve(binding).is_some()
    }

    /// 返回未满足的绑定（保持传入顺序）
    pub fn unmet<'a>(&self, required: impl IntoIterator<Item = &'a Binding>) -> Vec<Binding> {
        required
            .into_iter()
            .filter(|b| !self.satisfies(b))
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 当前已绑定的变量名集合
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.binding.name.as_str())
    }

    /// 完整浅拷贝（子流程无可见性限制时使用）
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// 受限视图：只保留指定变量名的最新条目
    pub fn view<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut bb = Self::new();
        for name in names {
            if let Some(entry) = self.latest(name.as_ref()) {
                bb.entries.push(entry.clone());
            }
        }
        bb
    }

    /// 变量名 -> 最新值
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            map.insert(entry.binding.name.clone(), entry.value.clone());
        }
        map
    }

    /// 只取指定绑定的值（用于流程结束时返回目标绑定）
    pub fn collect(&self, bindings: &[Binding]) -> BTreeMap<String, Value> {
        bindings
            .iter()
            .filter_map(|b| self.resolve(b).map(|e| (b.name.clone(), e.value.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_write_wins() {
        let mut bb = Blackboard::new();
        bb.bind(Binding::of_type("Draft"), json!("v1"));
        bb.bind(Binding::of_type("Draft"), json!("v2"));
        assert_eq!(bb.get("draft"), Some(&json!("v2")));
        assert_eq!(bb.len(), 2);
    }

    #[test]
    fn test_resolve_checks_type() {
        let mut bb = Blackboard::new();
        bb.bind(Binding::named("report", "Text"), json!("x"));
        assert!(bb.satisfies(&Binding::named("report", "Text")));
        assert!(!bb.satisfies(&Binding::named("report", "Pdf")));
    }

    #[test]
    fn test_resolve_by_type_for_default_name() {
        let mut bb = Blackboard::new();
        bb.bind(Binding::named("userQuery", "Query"), json!("rust"));
        // 默认名 `query` 未绑定，但同类型条目可满足
        assert!(bb.satisfies(&Binding::of_type("Query")));
        // 显式名不按类型回退
        assert!(!bb.satisfies(&Binding::named("other", "Query")));
    }

    #[test]
    fn test_view_restricts_bindings() {
        let mut bb = Blackboard::new();
        bb.bind(Binding::of_type("A"), json!(1));
        bb.bind(Binding::of_type("B"), json!(2));
        let view = bb.view(&["a"]);
        assert!(view.contains_name("a"));
        assert!(!view.contains_name("b"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_unmet_and_collect() {
        let mut bb = Blackboard::new();
        bb.bind(Binding::of_type("A"), json!(1));
        let required = vec![Binding::of_type("A"), Binding::of_type("B")];
        assert_eq!(bb.unmet(&required), vec![Binding::of_type("B")]);
        let collected = bb.collect(&required);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected.get("a"), Some(&json!(1)));
    }
}
