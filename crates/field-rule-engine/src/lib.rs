//! 动态表单字段规则引擎
//!
//! 根据声明式规则决定表单字段是否可见、当前值是否通过校验：
//! - JSON 字段配置（条件、逆波兰式可见性逻辑、叶子/组合校验）
//! - 条件求值与逻辑解释，所有异常一律降级为 false
//! - 字段编译诊断和线程安全的内存字段目录

pub mod catalog;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod logic;
pub mod models;
pub mod operators;

pub use catalog::{CatalogStats, FieldCatalog};
pub use compiler::{CompiledField, FieldCompiler};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::FieldExecutor;
pub use logic::{LogicInterpreter, OperandValues};
pub use models::{
    CompositeValidation, Condition, EvaluationContext, FieldConfig, FieldEvaluation,
    LeafValidation, Validation,
};
pub use operators::{LogicToken, Operator, tokens};

/// 字段在给定上下文中是否可见
pub fn is_visible(context: &EvaluationContext, field: &FieldConfig) -> bool {
    FieldExecutor::new().is_visible(context, field)
}

/// 校验字段，返回第一条失败消息
pub fn validate(context: &EvaluationContext, field: &FieldConfig) -> Option<String> {
    FieldExecutor::new().validate(context, field)
}
