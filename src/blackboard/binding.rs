//! Binding：黑板上的具名、带类型的槽位
//!
//! 变量名默认由类型名推导（取局部类型名并转为 lowerCamelCase），
//! 使独立编写的动作无需显式连线即可在同一中间类型上协作。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 任意类型通配（要求该类型的绑定接受任意类型的值）
pub const ANY_TYPE: &str = "Any";

/// 具名、带类型的绑定
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub type_name: String,
}

impl Binding {
    /// 按类型名创建绑定，变量名自动推导（如 `com.acme.UserInput` -> `userInput`）
    pub fn of_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: default_variable_name(&type_name),
            type_name,
        }
    }

    /// 显式指定变量名
    pub fn named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// 变量名是否为该类型的默认推导名（决定能否按类型查找）
    pub fn uses_default_name(&self) -> bool {
        self.name == default_variable_name(&self.type_name)
    }

    /// 给定类型名的值能否放入本绑定
    pub fn accepts(&self, type_name: &str) -> bool {
        self.type_name == ANY_TYPE || self.type_name == type_name
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.type_name)
    }
}

/// 由类型名推导变量名：去掉泛型参数与包/模块前缀，首字母小写
pub fn default_variable_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let local = without_generics
        .rsplit(|c: char| c == '.' || c == ':' || c == '$')
        .find(|s| !s.is_empty())
        .unwrap_or(without_generics)
        .trim();
    let mut chars = local.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
