//! 规则引擎错误类型
//!
//! 评估路径本身从不返回错误（所有异常都降级为 `false`），
//! 这里的错误只出现在解析、诊断和字段目录管理等外围接口上。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("校验规则 '{id}' 结构无效: {reason}")]
    InvalidValidation { id: String, reason: String },

    #[error("逻辑表达式格式错误: 第 {position} 个记号 {operator} 缺少操作数")]
    MalformedLogic { operator: String, position: usize },

    #[error("字段不存在: {0}")]
    FieldNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
