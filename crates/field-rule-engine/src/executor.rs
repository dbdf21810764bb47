//! 字段规则执行器
//!
//! 对单个字段编排条件求值与逻辑解释：
//! - 可见性：先求值全部条件得到 ID→结果 映射，再解释 `visibilityLogic`
//! - 校验：两遍扫描，先叶子校验后组合校验，遇到第一个带消息的失败立即返回

use crate::evaluator::ConditionEvaluator;
use crate::logic::{LogicInterpreter, OperandValues, render};
use crate::models::{Condition, EvaluationContext, FieldConfig, FieldEvaluation, Validation};
use form_shared::observability::metrics::record_field_evaluation;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// 字段规则执行器
#[derive(Debug, Clone, Default)]
pub struct FieldExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl FieldExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 字段在给定上下文中是否可见
    pub fn is_visible(&self, context: &EvaluationContext, field: &FieldConfig) -> bool {
        let start = Instant::now();
        let visible = self.visibility(context, field, &mut Vec::new());
        record_field_evaluation("visibility", start.elapsed().as_secs_f64());
        visible
    }

    /// 校验字段当前值，返回第一条失败消息；全部通过（或失败项没有消息）时返回 `None`
    pub fn validate(&self, context: &EvaluationContext, field: &FieldConfig) -> Option<String> {
        let start = Instant::now();
        let error = self.validation(context, field, &mut Vec::new());
        record_field_evaluation("validation", start.elapsed().as_secs_f64());
        error
    }

    /// 同时评估可见性和校验，返回完整结果
    pub fn evaluate(&self, context: &EvaluationContext, field: &FieldConfig) -> FieldEvaluation {
        let start = Instant::now();
        let mut result = FieldEvaluation::new(field.name.clone());

        result.visible = self.visibility(context, field, &mut result.evaluation_trace);
        result.error = self.validation(context, field, &mut result.evaluation_trace);

        let elapsed = start.elapsed();
        result.evaluation_time_us = elapsed.as_micros() as u64;
        record_field_evaluation("full", elapsed.as_secs_f64());

        result
    }

    fn visibility(
        &self,
        context: &EvaluationContext,
        field: &FieldConfig,
        trace: &mut Vec<String>,
    ) -> bool {
        let values = self.evaluate_conditions(context, &field.conditions, trace);
        let visible = LogicInterpreter::evaluate(&values, &field.visibility_logic);

        if self.trace_enabled {
            trace.push(format!(
                "visibility: [{}] => {}",
                render(&field.visibility_logic),
                if visible { "VISIBLE" } else { "HIDDEN" }
            ));
        }

        debug!(field = %field.name, visible, "字段可见性评估完成");
        visible
    }

    /// 逐个求值条件，重复 ID 以后出现的为准
    fn evaluate_conditions(
        &self,
        context: &EvaluationContext,
        conditions: &[Condition],
        trace: &mut Vec<String>,
    ) -> OperandValues {
        let mut values = OperandValues::with_capacity(conditions.len());

        for cond in conditions {
            let matched = ConditionEvaluator::evaluate(context, cond);

            if self.trace_enabled {
                trace.push(format!(
                    "{}: {} {} {} => {}",
                    cond.id,
                    cond.field,
                    cond.operator,
                    display_value(cond.value.as_ref()),
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));
            }

            values.insert(cond.id.clone(), matched);
        }

        values
    }

    fn validation(
        &self,
        context: &EvaluationContext,
        field: &FieldConfig,
        trace: &mut Vec<String>,
    ) -> Option<String> {
        let validations = field.validations();
        if validations.is_empty() {
            return None;
        }

        let mut values = OperandValues::with_capacity(validations.len());

        // 第一遍：叶子校验，结果写入映射表供组合校验引用
        for validation in validations {
            let Validation::Leaf(leaf) = validation else {
                continue;
            };

            let actual = context.get_field(&leaf.field);
            let passed = ConditionEvaluator::evaluate_value(
                actual.as_deref(),
                leaf.operator,
                leaf.value.as_ref(),
            );

            if self.trace_enabled {
                trace.push(format!(
                    "validation {}: {} {} {} => {}",
                    leaf.id,
                    leaf.field,
                    leaf.operator,
                    display_value(leaf.value.as_ref()),
                    if passed { "PASSED" } else { "FAILED" }
                ));
            }

            values.insert(leaf.id.clone(), passed);

            if !passed && !leaf.message.is_empty() {
                debug!(field = %field.name, validation = %leaf.id, "叶子校验失败");
                return Some(leaf.message.clone());
            }
        }

        // 第二遍：组合校验，只能引用叶子校验的结果
        for validation in validations {
            let Validation::Composite(composite) = validation else {
                continue;
            };

            let passed = LogicInterpreter::evaluate(&values, &composite.logic);

            if self.trace_enabled {
                trace.push(format!(
                    "validation {}: [{}] => {}",
                    composite.id,
                    render(&composite.logic),
                    if passed { "PASSED" } else { "FAILED" }
                ));
            }

            if !passed && !composite.message.is_empty() {
                debug!(field = %field.name, validation = %composite.id, "组合校验失败");
                return Some(composite.message.clone());
            }
        }

        None
    }
}

/// 追踪输出中的期望值，省略时显示为 undefined
fn display_value(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), Value::to_string)
}
