//! 字段编译器
//!
//! 把字段配置整理为可缓存的编译结果：预提取上下文字段路径，
//! 并收集配置诊断信息（重复 ID、无法解析的操作数）。
//! 诊断只记录告警，不拒绝配置，也不改变评估语义。

use crate::error::Result;
use crate::models::{FieldConfig, Validation};
use crate::operators::LogicToken;
use std::collections::HashSet;
use tracing::warn;

/// 编译后的字段
#[derive(Debug, Clone)]
pub struct CompiledField {
    /// 原始字段配置
    pub field: FieldConfig,
    /// 条件和叶子校验读取的上下文字段路径
    pub required_fields: HashSet<String>,
    /// 重复出现的条件或校验 ID（评估时后者覆盖前者）
    pub duplicate_ids: Vec<String>,
    /// 逻辑表达式中引用了但没有定义的操作数（评估时按 false 处理）
    pub unresolved_operands: Vec<String>,
    /// 编译版本号（用于缓存失效）
    pub compile_version: u64,
}

impl CompiledField {
    /// 获取字段名
    pub fn name(&self) -> &str {
        &self.field.name
    }

    /// 获取字段配置
    pub fn field(&self) -> &FieldConfig {
        &self.field
    }

    /// 是否存在配置诊断
    pub fn has_diagnostics(&self) -> bool {
        !self.duplicate_ids.is_empty() || !self.unresolved_operands.is_empty()
    }
}

/// 字段编译器
pub struct FieldCompiler {
    compile_version: u64,
}

impl FieldCompiler {
    pub fn new() -> Self {
        Self { compile_version: 0 }
    }

    /// 从 JSON 字符串编译字段
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledField> {
        let field = FieldConfig::from_json(json)?;
        Ok(self.compile(field))
    }

    /// 编译字段
    pub fn compile(&mut self, field: FieldConfig) -> CompiledField {
        let required_fields = self.extract_fields(&field);
        let duplicate_ids = self.find_duplicate_ids(&field);
        let unresolved_operands = self.find_unresolved_operands(&field);

        for id in &duplicate_ids {
            warn!(field = %field.name, id = %id, "重复的规则 ID，后定义的结果将覆盖先定义的");
        }
        for id in &unresolved_operands {
            warn!(field = %field.name, operand = %id, "逻辑表达式引用了未定义的 ID，将按 false 处理");
        }

        self.compile_version += 1;

        CompiledField {
            field,
            required_fields,
            duplicate_ids,
            unresolved_operands,
            compile_version: self.compile_version,
        }
    }

    /// 提取字段配置读取的所有上下文路径
    fn extract_fields(&self, field: &FieldConfig) -> HashSet<String> {
        let mut fields: HashSet<String> =
            field.conditions.iter().map(|c| c.field.clone()).collect();

        for validation in field.validations() {
            if let Validation::Leaf(leaf) = validation {
                fields.insert(leaf.field.clone());
            }
        }

        fields
    }

    /// 条件 ID 和校验 ID 各自的命名空间内查找重复
    fn find_duplicate_ids(&self, field: &FieldConfig) -> Vec<String> {
        let mut duplicates = Vec::new();

        let condition_ids = field.conditions.iter().map(|c| c.id.as_str());
        collect_duplicates(condition_ids, &mut duplicates);

        let validation_ids = field.validations().iter().map(Validation::id);
        collect_duplicates(validation_ids, &mut duplicates);

        duplicates
    }

    /// 可见性逻辑只能引用条件 ID，组合校验只能引用叶子校验 ID
    fn find_unresolved_operands(&self, field: &FieldConfig) -> Vec<String> {
        let mut unresolved = Vec::new();

        let condition_ids: HashSet<&str> = field.conditions.iter().map(|c| c.id.as_str()).collect();
        collect_unresolved(&field.visibility_logic, &condition_ids, &mut unresolved);

        let leaf_ids: HashSet<&str> = field
            .validations()
            .iter()
            .filter(|v| !v.is_composite())
            .map(Validation::id)
            .collect();

        for validation in field.validations() {
            if let Validation::Composite(composite) = validation {
                collect_unresolved(&composite.logic, &leaf_ids, &mut unresolved);
            }
        }

        unresolved
    }
}

impl Default for FieldCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_duplicates<'a>(ids: impl Iterator<Item = &'a str>, out: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) && !out.iter().any(|d| d == id) {
            out.push(id.to_string());
        }
    }
}

fn collect_unresolved(tokens: &[LogicToken], known: &HashSet<&str>, out: &mut Vec<String>) {
    for token in tokens {
        let LogicToken::Operand(id) = token else {
            continue;
        };
        if !known.contains(id.as_str()) && !out.contains(id) {
            out.push(id.clone());
        }
    }
}
