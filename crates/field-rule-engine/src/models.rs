//! 规则引擎领域模型

use crate::error::RuleError;
use crate::operators::{LogicToken, Operator};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

/// 条件定义：字段路径、操作符和期望值，ID 供逻辑表达式引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    pub field: String,
    pub operator: Operator,
    /// 期望值，JSON 中省略时为 `None`（未定义，区别于显式的 `null`）
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

/// 字段存在即为 `Some`，包括显式的 `null`
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Condition {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }
}

/// 字段校验规则
///
/// JSON 中两种形态共用一个扁平结构，`logic` 是否存在决定了它是组合规则还是叶子规则。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawValidation", into = "RawValidation")]
pub enum Validation {
    /// 直接对上下文求值的校验
    Leaf(LeafValidation),
    /// 对此前叶子校验结果做逻辑组合的校验
    Composite(CompositeValidation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafValidation {
    pub id: String,
    pub field: String,
    pub operator: Operator,
    pub value: Option<Value>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeValidation {
    pub id: String,
    pub logic: Vec<LogicToken>,
    pub message: String,
}

impl Validation {
    pub fn leaf(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
        message: impl Into<String>,
    ) -> Self {
        Self::Leaf(LeafValidation {
            id: id.into(),
            field: field.into(),
            operator,
            value: Some(value.into()),
            message: message.into(),
        })
    }

    pub fn composite(
        id: impl Into<String>,
        logic: Vec<LogicToken>,
        message: impl Into<String>,
    ) -> Self {
        Self::Composite(CompositeValidation {
            id: id.into(),
            logic,
            message: message.into(),
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Leaf(v) => &v.id,
            Self::Composite(v) => &v.id,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Leaf(v) => &v.message,
            Self::Composite(v) => &v.message,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }
}

/// 校验规则的线上格式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawValidation {
    id: String,
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logic: Option<Vec<LogicToken>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operator: Option<Operator>,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    value: Option<Value>,
}

impl TryFrom<RawValidation> for Validation {
    type Error = RuleError;

    fn try_from(raw: RawValidation) -> Result<Self, Self::Error> {
        if let Some(logic) = raw.logic {
            return Ok(Self::Composite(CompositeValidation {
                id: raw.id,
                logic,
                message: raw.message,
            }));
        }

        let field = raw.field.ok_or_else(|| RuleError::InvalidValidation {
            id: raw.id.clone(),
            reason: "缺少 logic 或 field".to_string(),
        })?;
        let operator = raw.operator.ok_or_else(|| RuleError::InvalidValidation {
            id: raw.id.clone(),
            reason: "缺少 operator".to_string(),
        })?;

        Ok(Self::Leaf(LeafValidation {
            id: raw.id,
            field,
            operator,
            value: raw.value,
            message: raw.message,
        }))
    }
}

impl From<Validation> for RawValidation {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation::Leaf(v) => Self {
                id: v.id,
                message: v.message,
                logic: None,
                field: Some(v.field),
                operator: Some(v.operator),
                value: v.value,
            },
            Validation::Composite(v) => Self {
                id: v.id,
                message: v.message,
                logic: Some(v.logic),
                field: None,
                operator: None,
                value: None,
            },
        }
    }
}

/// 动态表单字段配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// 可见性逻辑（逆波兰式），为空表示总是可见
    #[serde(default)]
    pub visibility_logic: Vec<LogicToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Vec<Validation>>,
}

impl FieldConfig {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type: field_type.into(),
            conditions: Vec::new(),
            visibility_logic: Vec::new(),
            validations: None,
        }
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_visibility_logic(mut self, logic: Vec<LogicToken>) -> Self {
        self.visibility_logic = logic;
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validations.get_or_insert_with(Vec::new).push(validation);
        self
    }

    /// 校验规则切片（未配置时为空）
    pub fn validations(&self) -> &[Validation] {
        self.validations.as_deref().unwrap_or_default()
    }
}

/// 非空路径片段：`a`、`[0]`、`["k"]`、`['k']`
static PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^.\[\]]+|\[(?:(-?\d+(?:\.\d+)?)|"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\]"#)
        .expect("path segment pattern is valid")
});

/// 引号片段中的转义：`\"` -> `"`，`\\` -> `\`
static ESCAPE_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(\\)?").expect("escape pattern is valid"));

/// 将字段路径拆分为片段
///
/// 空片段保留为 `""`：开头的 `.`，以及后面紧跟 `.`、`[]` 或路径结尾的 `.` / `[]`。
/// 例如 `"a..b"` 拆分为 `["a", "", "b"]`，`"country."` 拆分为 `["country", ""]`。
pub fn path_segments(path: &str) -> Vec<Cow<'_, str>> {
    let mut segments = Vec::new();
    if path.starts_with('.') {
        segments.push(Cow::Borrowed(""));
    }

    let mut cursor = 0;
    for caps in PATH_SEGMENT.captures_iter(path) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_empty_segments(path, cursor, whole.start(), &mut segments);
        cursor = whole.end();

        let segment = if let Some(number) = caps.get(1) {
            Cow::Borrowed(number.as_str())
        } else if let Some(quoted) = caps.get(2).or_else(|| caps.get(3)) {
            ESCAPE_CHAR.replace_all(quoted.as_str(), "$1")
        } else {
            Cow::Borrowed(whole.as_str())
        };
        segments.push(segment);
    }
    push_empty_segments(path, cursor, path.len(), &mut segments);

    segments
}

/// 非空片段之间只剩 `.`、`[`、`]`，逐个位置检查是否构成空片段
fn push_empty_segments<'a>(
    path: &'a str,
    start: usize,
    end: usize,
    segments: &mut Vec<Cow<'a, str>>,
) {
    for position in start..end {
        let rest = &path[position..];
        let after = rest.strip_prefix('.').or_else(|| rest.strip_prefix("[]"));
        if after.is_some_and(|after| {
            after.is_empty() || after.starts_with('.') || after.starts_with("[]")
        }) {
            segments.push(Cow::Borrowed(""));
        }
    }
}

/// 数组下标：只接受规范的非负整数写法（"01" 不是下标）
fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>().ok().filter(|index| index.to_string() == key)
}

/// 读取单个属性
///
/// 字符串按 UTF-16 下标取字符；数组和字符串支持 `length`。
fn property<'a>(value: &'a Value, key: &str) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(map) => map.get(key).map(Cow::Borrowed),
        Value::Array(items) if key == "length" => Some(Cow::Owned(Value::from(items.len()))),
        Value::Array(items) => items.get(array_index(key)?).map(Cow::Borrowed),
        Value::String(s) if key == "length" => {
            Some(Cow::Owned(Value::from(s.encode_utf16().count())))
        }
        Value::String(s) => {
            let unit = s.encode_utf16().nth(array_index(key)?)?;
            String::from_utf16(&[unit])
                .ok()
                .map(|c| Cow::Owned(Value::String(c)))
        }
        _ => None,
    }
}

/// 评估上下文 - 提供给规则引擎的数据
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: Value,
}

impl EvaluationContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 获取字段值
    ///
    /// 支持点号和方括号路径，如 "user.profile.age"、"items[0].name"、"items.0.name"。
    /// 顶层存在同名键（例如字面量 "a.b"）时优先返回该键。
    /// 路径不存在返回 `None`，调用方把它当作"未定义"处理。
    /// 字符下标和 `length` 是计算出的值，以 `Cow::Owned` 返回。
    pub fn get_field(&self, path: &str) -> Option<Cow<'_, Value>> {
        if let Some(value) = self.data.as_object().and_then(|map| map.get(path)) {
            return Some(Cow::Borrowed(value));
        }

        let segments = path_segments(path);
        if segments.is_empty() {
            return None;
        }

        let mut current = Cow::Borrowed(&self.data);
        for segment in &segments {
            current = match current {
                Cow::Borrowed(value) => property(value, segment)?,
                Cow::Owned(value) => Cow::Owned(property(&value, segment)?.into_owned()),
            };
        }

        Some(current)
    }

    /// 浅合并覆盖值，返回新的上下文（原上下文不变）
    ///
    /// 用于把当前表单值叠加到环境属性上。非对象的一方会被覆盖值整体替换。
    pub fn with_overrides(&self, overrides: &Value) -> Self {
        match (&self.data, overrides) {
            (Value::Object(base), Value::Object(extra)) => {
                let mut merged = base.clone();
                for (key, value) in extra {
                    merged.insert(key.clone(), value.clone());
                }
                Self::new(Value::Object(merged))
            }
            (_, Value::Null) => self.clone(),
            (_, other) => Self::new(other.clone()),
        }
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl From<Value> for EvaluationContext {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// 单个字段的评估结果
#[derive(Debug, Clone, Serialize)]
pub struct FieldEvaluation {
    pub name: String,
    pub visible: bool,
    pub error: Option<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}

impl FieldEvaluation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: false,
            error: None,
            evaluation_trace: Vec::new(),
            evaluation_time_us: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::tokens;
    use serde_json::json;

    #[test]
    fn test_field_config_deserialization() {
        let json = r#"
        {
            "name": "fcm_otd_required",
            "label": "FCM(OTD) - Required",
            "type": "text",
            "conditions": [
                { "id": "isUSCountry", "field": "country", "operator": "equals", "value": "US" },
                { "id": "isBCO", "field": "type", "operator": "equals", "value": "BCO" }
            ],
            "visibilityLogic": ["isUSCountry", "isBCO", "AND"],
            "validations": [
                { "id": "isRequired", "field": "fcm_otd_required", "operator": "not_equals", "value": "", "message": "" },
                { "id": "combinedCheck", "logic": ["isRequired", "NOT"], "message": "required" }
            ]
        }
        "#;

        let field = FieldConfig::from_json(json).unwrap();
        assert_eq!(field.name, "fcm_otd_required");
        assert_eq!(field.field_type, "text");
        assert_eq!(field.conditions.len(), 2);
        assert_eq!(field.visibility_logic, tokens(["isUSCountry", "isBCO", "AND"]));

        let validations = field.validations();
        assert_eq!(validations.len(), 2);
        assert!(!validations[0].is_composite());
        assert!(validations[1].is_composite());
        assert_eq!(validations[1].message(), "required");
    }

    #[test]
    fn test_field_config_defaults() {
        let field = FieldConfig::from_json(r#"{ "name": "plain" }"#).unwrap();
        assert!(field.conditions.is_empty());
        assert!(field.visibility_logic.is_empty());
        assert!(field.validations.is_none());
        assert!(field.validations().is_empty());
    }

    #[test]
    fn test_validation_logic_is_discriminant() {
        // 同时带有 logic 和 field 时按组合规则处理
        let validation: Validation = serde_json::from_value(json!({
            "id": "mixed",
            "logic": ["a", "b", "OR"],
            "field": "x",
            "operator": "equals",
            "value": 1
        }))
        .unwrap();

        assert!(validation.is_composite());
        assert_eq!(validation.message(), "");
    }

    #[test]
    fn test_omitted_value_differs_from_null() {
        let omitted: Condition = serde_json::from_value(json!({
            "id": "c", "field": "x", "operator": "not_equals"
        }))
        .unwrap();
        let null: Condition = serde_json::from_value(json!({
            "id": "c", "field": "x", "operator": "not_equals", "value": null
        }))
        .unwrap();

        assert_eq!(omitted.value, None);
        assert_eq!(null.value, Some(Value::Null));
        assert!(serde_json::to_value(&omitted).unwrap().get("value").is_none());
        assert_eq!(serde_json::to_value(&null).unwrap()["value"], Value::Null);

        let leaf: Validation = serde_json::from_value(json!({
            "id": "v", "field": "x", "operator": "equals", "message": ""
        }))
        .unwrap();
        match leaf {
            Validation::Leaf(leaf) => assert_eq!(leaf.value, None),
            Validation::Composite(_) => panic!("expected leaf validation"),
        }
    }

    #[test]
    fn test_validation_missing_shape() {
        let result: Result<Validation, _> = serde_json::from_value(json!({
            "id": "broken",
            "message": "oops"
        }));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("broken"));
    }

    #[test]
    fn test_validation_serialization_shape() {
        let validation = Validation::composite("combo", tokens(["a", "b", "AND"]), "bad");
        let value = serde_json::to_value(&validation).unwrap();
        assert_eq!(
            value,
            json!({ "id": "combo", "message": "bad", "logic": ["a", "b", "AND"] })
        );

        let leaf = Validation::leaf("isRequired", "email", Operator::NotEquals, "", "");
        let value = serde_json::to_value(&leaf).unwrap();
        assert_eq!(value["operator"], json!("not_equals"));
        assert!(value.get("logic").is_none());
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(path_segments("items[0].name"), vec!["items", "0", "name"]);
        assert_eq!(path_segments(r#"a["b.c"].d"#), vec!["a", "b.c", "d"]);
        assert_eq!(path_segments("a['k']"), vec!["a", "k"]);
        assert!(path_segments("").is_empty());
    }

    #[test]
    fn test_path_segments_keep_empty_keys() {
        assert_eq!(path_segments("country."), vec!["country", ""]);
        assert_eq!(path_segments("a..b"), vec!["a", "", "b"]);
        assert_eq!(path_segments(".country"), vec!["", "country"]);
        assert_eq!(path_segments("a[]"), vec!["a", ""]);
        assert_eq!(path_segments("a[-1]"), vec!["a", "-1"]);
        assert_eq!(path_segments(r#"a["say \"hi\""]"#), vec!["a", r#"say "hi""#]);
    }

    #[test]
    fn test_malformed_paths_are_undefined() {
        let ctx = EvaluationContext::new(json!({
            "country": "US",
            "a": {"b": 1}
        }));

        assert_eq!(ctx.get_field("country.").as_deref(), None);
        assert_eq!(ctx.get_field("a..b").as_deref(), None);
        assert_eq!(ctx.get_field(".country").as_deref(), None);
        assert_eq!(ctx.get_field("a.b").as_deref(), Some(&json!(1)));
    }

    #[test]
    fn test_string_index_and_length() {
        let ctx = EvaluationContext::new(json!({
            "name": "abc",
            "tags": ["x", "y"],
            "codes": ["US"]
        }));

        assert_eq!(ctx.get_field("name[0]").as_deref(), Some(&json!("a")));
        assert_eq!(ctx.get_field("name.2").as_deref(), Some(&json!("c")));
        assert_eq!(ctx.get_field("name[3]").as_deref(), None);
        assert_eq!(ctx.get_field("name.length").as_deref(), Some(&json!(3)));
        assert_eq!(ctx.get_field("tags.length").as_deref(), Some(&json!(2)));
        assert_eq!(ctx.get_field("codes[0][1]").as_deref(), Some(&json!("S")));
        assert_eq!(ctx.get_field("tags[01]").as_deref(), None);
    }

    #[test]
    fn test_context_from_json() {
        let ctx = EvaluationContext::from_json(r#"{"country": "VN", "type": null}"#).unwrap();

        assert_eq!(ctx.get_field("country").as_deref(), Some(&json!("VN")));
        assert_eq!(ctx.get_field("type").as_deref(), Some(&json!(null)));
        assert!(EvaluationContext::from_json("{not json").is_err());
    }

    #[test]
    fn test_evaluation_context() {
        let ctx = EvaluationContext::new(json!({
            "country": "US",
            "customer": {
                "type": "BCO",
                "tags": ["vip", "annual"]
            },
            "orders": [
                {"id": "o-1", "amount": 100},
                {"id": "o-2", "amount": 200}
            ],
            "a.b": "literal",
            "nothing": null
        }));

        assert_eq!(ctx.get_field("country").as_deref(), Some(&json!("US")));
        assert_eq!(ctx.get_field("customer.type").as_deref(), Some(&json!("BCO")));
        assert_eq!(ctx.get_field("customer.tags[1]").as_deref(), Some(&json!("annual")));
        assert_eq!(ctx.get_field("orders.1.amount").as_deref(), Some(&json!(200)));
        assert_eq!(ctx.get_field("orders[0].id").as_deref(), Some(&json!("o-1")));
        assert_eq!(ctx.get_field("a.b").as_deref(), Some(&json!("literal")));
        assert_eq!(ctx.get_field("nothing").as_deref(), Some(&json!(null)));
        assert_eq!(ctx.get_field("nothing.deeper").as_deref(), None);
        assert_eq!(ctx.get_field("orders[5].id").as_deref(), None);
        assert_eq!(ctx.get_field("country.code").as_deref(), None);
        assert_eq!(ctx.get_field("nonexistent").as_deref(), None);
        assert_eq!(ctx.get_field("").as_deref(), None);
    }

    #[test]
    fn test_with_overrides() {
        let ctx = EvaluationContext::new(json!({ "country": "VN", "email": "a@b" }));
        let merged = ctx.with_overrides(&json!({ "email": "", "phone": "" }));

        assert_eq!(merged.get_field("country").as_deref(), Some(&json!("VN")));
        assert_eq!(merged.get_field("email").as_deref(), Some(&json!("")));
        assert_eq!(merged.get_field("phone").as_deref(), Some(&json!("")));
        // 原上下文不变
        assert_eq!(ctx.get_field("email").as_deref(), Some(&json!("a@b")));
        assert_eq!(ctx.with_overrides(&Value::Null).data(), ctx.data());
    }
}
