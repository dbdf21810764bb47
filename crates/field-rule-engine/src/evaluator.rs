//! 条件评估器
//!
//! 对单个条件求值。评估从不失败：字段缺失、类型不可比较等情况
//! 一律得到确定的布尔值（通常为 false）。

use crate::models::{Condition, EvaluationContext};
use crate::operators::Operator;
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 在上下文中解析条件字段并求值
    pub fn evaluate(context: &EvaluationContext, condition: &Condition) -> bool {
        let actual = context.get_field(&condition.field);
        Self::evaluate_value(
            actual.as_deref(),
            condition.operator,
            condition.value.as_ref(),
        )
    }

    /// 对已解析的字段值求值
    ///
    /// # Arguments
    /// * `actual` - 从上下文中获取的字段值，`None` 表示路径不存在（未定义）
    /// * `operator` - 操作符
    /// * `expected` - 条件中定义的期望值，`None` 表示配置中省略了期望值（未定义）
    pub fn evaluate_value(
        actual: Option<&Value>,
        operator: Operator,
        expected: Option<&Value>,
    ) -> bool {
        match operator {
            Operator::Equals => Self::strict_eq(actual, expected),
            Operator::NotEquals => !Self::strict_eq(actual, expected),
            Operator::GreaterThan => Self::compare(actual, expected) == Some(Ordering::Greater),
            Operator::LessThan => Self::compare(actual, expected) == Some(Ordering::Less),
            Operator::GreaterOrEqual => matches!(
                Self::compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessOrEqual => matches!(
                Self::compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Includes => Self::contains(actual, expected).unwrap_or(false),
            // 非容器类型既不"包含"也不"不包含"，两者都为 false
            Operator::NotIncludes => Self::contains(actual, expected).is_some_and(|found| !found),
        }
    }

    /// 严格相等：不做类型转换，未定义值只等于未定义值
    fn strict_eq(actual: Option<&Value>, expected: Option<&Value>) -> bool {
        match (actual, expected) {
            (None, None) => true,
            (Some(actual), Some(expected)) => Self::values_eq(actual, expected),
            _ => false,
        }
    }

    fn values_eq(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // 整数和浮点数统一按数值比较（1 == 1.0）
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::values_eq(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| Self::values_eq(v, other)))
            }
            _ => false,
        }
    }

    /// 关系比较
    ///
    /// 两侧都是字符串时按 UTF-16 码元字典序比较，否则都转换为数值比较；
    /// 任何一侧无法转换为数值（包括未定义）时返回 `None`。
    fn compare(actual: Option<&Value>, expected: Option<&Value>) -> Option<Ordering> {
        let left = Primitive::from_value(actual);
        let right = Primitive::from_value(expected);

        match (left, right) {
            (Primitive::Str(a), Primitive::Str(b)) => {
                Some(a.encode_utf16().cmp(b.encode_utf16()))
            }
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        }
    }

    /// 包含检查，`None` 表示实际值不是容器（数组或字符串）
    fn contains(actual: Option<&Value>, expected: Option<&Value>) -> Option<bool> {
        match actual? {
            // JSON 数组中没有未定义元素
            Value::Array(items) => Some(expected.is_some_and(|expected| {
                items.iter().any(|item| Self::values_eq(item, expected))
            })),
            Value::String(s) => {
                let needle = expected.map_or(Cow::Borrowed("undefined"), to_js_string);
                Some(s.contains(&*needle))
            }
            _ => None,
        }
    }
}

/// 关系比较前的原始值
enum Primitive<'a> {
    Str(Cow<'a, str>),
    Num(f64),
}

impl<'a> Primitive<'a> {
    fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            None => Self::Num(f64::NAN),
            Some(Value::Null) => Self::Num(0.0),
            Some(Value::Bool(b)) => Self::Num(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => Self::Num(n.as_f64().unwrap_or(f64::NAN)),
            Some(Value::String(s)) => Self::Str(Cow::Borrowed(s)),
            Some(other) => Self::Str(to_js_string(other)),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Self::Num(n) => *n,
            Self::Str(s) => parse_number(s),
        }
    }
}

/// 字符串转数值：空白串为 0，非数值为 NaN
fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }

    // 只接受十进制数字形式，排除 "inf"、"nan" 之类的写法
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }

    s.parse().unwrap_or(f64::NAN)
}

/// 值的字符串形式：数组以逗号连接，对象为 "[object Object]"
fn to_js_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed("null"),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => Cow::Owned(number_to_string(n)),
        Value::String(s) => Cow::Borrowed(s),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| match item {
                    Value::Null => Cow::Borrowed(""),
                    other => to_js_string(other),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Cow::Borrowed("[object Object]"),
    }
}

fn number_to_string(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }

    match n.as_f64() {
        // 整数值的浮点数不带小数部分，-0 输出为 "0"
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
