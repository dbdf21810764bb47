//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 操作符集合是封闭的：未知字符串在反序列化阶段即被拒绝，
/// 评估器里只需要一个穷尽的 match。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 严格相等
    Equals,
    NotEquals,

    // 关系比较
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,

    // 包含检查（数组元素或子串）
    Includes,
    NotIncludes,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::Includes,
        Self::NotIncludes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::LessOrEqual => "less_or_equal",
            Self::Includes => "includes",
            Self::NotIncludes => "not_includes",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逻辑表达式记号（逆波兰式）
///
/// 序列化为普通字符串：`"AND"` / `"OR"` / `"NOT"` 是操作符（区分大小写），
/// 其余字符串都视为条件 ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogicToken {
    Operand(String),
    And,
    Or,
    Not,
}

impl LogicToken {
    /// 创建操作数记号
    pub fn operand(id: impl Into<String>) -> Self {
        Self::Operand(id.into())
    }
}

impl From<&str> for LogicToken {
    fn from(s: &str) -> Self {
        match s {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            other => Self::Operand(other.to_string()),
        }
    }
}

impl From<String> for LogicToken {
    fn from(s: String) -> Self {
        match s.as_str() {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            _ => Self::Operand(s),
        }
    }
}

impl From<LogicToken> for String {
    fn from(token: LogicToken) -> Self {
        match token {
            LogicToken::Operand(id) => id,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for LogicToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(id) => write!(f, "{}", id),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Not => write!(f, "NOT"),
        }
    }
}

/// 将字符串序列转换为记号序列
pub fn tokens<I, S>(items: I) -> Vec<LogicToken>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| LogicToken::from(s.as_ref()))
        .collect()
}
