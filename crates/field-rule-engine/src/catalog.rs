//! 字段目录
//!
//! 使用 DashMap 提供线程安全的内存字段缓存，支持字段的加载、更新、删除和批量评估。
//! 目录只存在于内存中，不负责持久化。

use crate::compiler::{CompiledField, FieldCompiler};
use crate::error::{Result, RuleError};
use crate::executor::FieldExecutor;
use crate::models::{EvaluationContext, FieldConfig, FieldEvaluation};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument, warn};

/// 目录条目，`sequence` 记录首次加载顺序
#[derive(Debug, Clone)]
struct CatalogEntry {
    compiled: CompiledField,
    sequence: u64,
}

/// 字段目录
#[derive(Clone)]
pub struct FieldCatalog {
    /// 编译后的字段缓存
    fields: Arc<DashMap<String, CatalogEntry>>,
    /// 字段编译器
    compiler: Arc<parking_lot::Mutex<FieldCompiler>>,
    /// 字段执行器
    executor: Arc<FieldExecutor>,
    next_sequence: Arc<AtomicU64>,
}

impl FieldCatalog {
    /// 创建新的字段目录
    pub fn new() -> Self {
        Self::with_executor(FieldExecutor::new())
    }

    /// 使用指定执行器创建字段目录（例如启用追踪的执行器）
    pub fn with_executor(executor: FieldExecutor) -> Self {
        Self {
            fields: Arc::new(DashMap::new()),
            compiler: Arc::new(parking_lot::Mutex::new(FieldCompiler::new())),
            executor: Arc::new(executor),
            next_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 获取当前目录中的字段数量
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 检查目录是否为空
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 目录使用的执行器
    pub fn executor(&self) -> &FieldExecutor {
        &self.executor
    }

    /// 加载字段（同名字段被替换，但保留原有顺序）
    #[instrument(skip(self, field), fields(field_name = %field.name))]
    pub fn load(&self, field: FieldConfig) {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(field)
        };

        self.insert(compiled);
    }

    /// 加载字段（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_from_json(json)?
        };

        Ok(self.insert(compiled))
    }

    /// 加载字段目录（JSON 数组）
    #[instrument(skip(self, json))]
    pub fn load_catalog_json(&self, json: &str) -> Result<Vec<String>> {
        let fields: Vec<FieldConfig> = serde_json::from_str(json)?;
        Ok(self.load_batch(fields))
    }

    /// 批量加载字段，返回加载的字段名
    #[instrument(skip(self, fields))]
    pub fn load_batch(&self, fields: Vec<FieldConfig>) -> Vec<String> {
        let mut loaded = Vec::with_capacity(fields.len());

        for field in fields {
            loaded.push(field.name.clone());
            self.load(field);
        }

        info!("批量加载完成: {} 个字段", loaded.len());
        loaded
    }

    fn insert(&self, compiled: CompiledField) -> String {
        let name = compiled.name().to_string();

        if compiled.has_diagnostics() {
            warn!(
                field_name = %name,
                duplicate_ids = ?compiled.duplicate_ids,
                unresolved_operands = ?compiled.unresolved_operands,
                "字段配置存在诊断告警"
            );
        }

        let sequence = self
            .fields
            .get(&name)
            .map(|entry| entry.sequence)
            .unwrap_or_else(|| self.next_sequence.fetch_add(1, Ordering::Relaxed));

        self.fields
            .insert(name.clone(), CatalogEntry { compiled, sequence });

        info!("字段已加载: {}", name);
        name
    }

    /// 更新字段
    #[instrument(skip(self, field), fields(field_name = %field.name))]
    pub fn update(&self, field: FieldConfig) -> Result<()> {
        if !self.fields.contains_key(&field.name) {
            warn!("更新不存在的字段: {}", field.name);
            return Err(RuleError::FieldNotFound(field.name));
        }

        self.load(field);
        Ok(())
    }

    /// 删除字段
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.fields.remove(name).is_some() {
            info!("字段已删除: {}", name);
            Ok(())
        } else {
            warn!("删除不存在的字段: {}", name);
            Err(RuleError::FieldNotFound(name.to_string()))
        }
    }

    /// 获取字段
    pub fn get(&self, name: &str) -> Option<CompiledField> {
        self.fields.get(name).map(|entry| entry.compiled.clone())
    }

    /// 检查字段是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// 按加载顺序获取所有字段名
    pub fn list_names(&self) -> Vec<String> {
        self.list_all()
            .into_iter()
            .map(|compiled| compiled.field.name)
            .collect()
    }

    /// 按加载顺序获取所有字段
    pub fn list_all(&self) -> Vec<CompiledField> {
        let mut entries: Vec<CatalogEntry> =
            self.fields.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries.into_iter().map(|entry| entry.compiled).collect()
    }

    /// 评估单个字段
    pub fn evaluate(&self, name: &str, context: &EvaluationContext) -> Result<FieldEvaluation> {
        let compiled = self
            .get(name)
            .ok_or_else(|| RuleError::FieldNotFound(name.to_string()))?;

        Ok(self.executor.evaluate(context, compiled.field()))
    }

    /// 按加载顺序评估所有字段
    #[instrument(skip(self, context))]
    pub fn evaluate_all(&self, context: &EvaluationContext) -> Vec<FieldEvaluation> {
        self.list_all()
            .iter()
            .map(|compiled| self.executor.evaluate(context, compiled.field()))
            .collect()
    }

    /// 清空所有字段
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.fields.len();
        self.fields.clear();
        info!("已清空 {} 个字段", count);
    }

    /// 获取目录统计信息
    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            fields_count: self.fields.len(),
            ..CatalogStats::default()
        };

        for entry in self.fields.iter() {
            let compiled = &entry.compiled;
            stats.total_conditions += compiled.field.conditions.len();
            stats.total_validations += compiled.field.validations().len();
            if compiled.has_diagnostics() {
                stats.fields_with_diagnostics += 1;
            }
        }

        stats
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// 目录统计信息
#[derive(Debug, Clone, Default)]
pub struct CatalogStats {
    /// 字段总数
    pub fields_count: usize,
    /// 所有字段的条件总数
    pub total_conditions: usize,
    /// 所有字段的校验规则总数
    pub total_validations: usize,
    /// 存在诊断告警的字段数
    pub fields_with_diagnostics: usize,
}
