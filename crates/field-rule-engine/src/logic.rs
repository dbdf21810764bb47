//! 逆波兰式逻辑解释器
//!
//! 逻辑表达式已经是后缀形式，用一个布尔栈即可求值，无需处理优先级。
//! 操作数是条件（或校验）ID，其结果由调用方预先计算好放在映射表中。

use crate::error::{Result, RuleError};
use crate::operators::LogicToken;
use form_shared::observability::metrics::record_malformed_logic;
use std::collections::HashMap;
use tracing::warn;

/// 条件 ID 到求值结果的映射
pub type OperandValues = HashMap<String, bool>;

/// 逻辑表达式解释器
pub struct LogicInterpreter;

impl LogicInterpreter {
    /// 求值逻辑表达式，格式错误时记录告警并返回 false
    ///
    /// - 空表达式视为恒真
    /// - 映射表中不存在的操作数按 false 处理
    pub fn evaluate(values: &OperandValues, tokens: &[LogicToken]) -> bool {
        match Self::try_evaluate(values, tokens) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, tokens = %render(tokens), "Invalid logic stack");
                record_malformed_logic();
                false
            }
        }
    }

    /// 求值逻辑表达式，操作符缺少操作数时返回错误
    pub fn try_evaluate(values: &OperandValues, tokens: &[LogicToken]) -> Result<bool> {
        let mut stack: Vec<bool> = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            match token {
                LogicToken::Operand(id) => {
                    stack.push(values.get(id.as_str()).copied().unwrap_or(false));
                }
                LogicToken::Not => {
                    let value = stack.pop().ok_or_else(|| malformed(token, index))?;
                    stack.push(!value);
                }
                LogicToken::And | LogicToken::Or => {
                    // 先弹出的是栈顶（右操作数）
                    let first = stack.pop().ok_or_else(|| malformed(token, index))?;
                    let second = stack.pop().ok_or_else(|| malformed(token, index))?;

                    stack.push(match token {
                        LogicToken::And => first && second,
                        _ => first || second,
                    });
                }
            }
        }

        Ok(stack.pop().unwrap_or(true))
    }
}

fn malformed(token: &LogicToken, index: usize) -> RuleError {
    RuleError::MalformedLogic {
        operator: token.to_string(),
        position: index + 1,
    }
}

/// 用于日志输出的表达式文本
pub fn render(tokens: &[LogicToken]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
