//! 指标模块
//!
//! 基于 metrics crate 记录规则评估指标。未安装 recorder 时所有记录都是空操作。

/// 描述本服务使用的指标
///
/// 这些描述会出现在导出端（如 Prometheus）的 HELP 注释中。
pub fn describe_metrics() {
    metrics::describe_counter!(
        "field_evaluations_total",
        "Total number of field rule evaluations"
    );
    metrics::describe_histogram!(
        "field_evaluation_duration_seconds",
        "Field rule evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "malformed_logic_total",
        "Total number of logic expressions that failed to evaluate"
    );
}

/// 记录一次字段评估
#[inline]
pub fn record_field_evaluation(kind: &'static str, duration_secs: f64) {
    metrics::counter!("field_evaluations_total", "kind" => kind).increment(1);
    metrics::histogram!("field_evaluation_duration_seconds", "kind" => kind).record(duration_secs);
}

/// 记录一次格式错误的逻辑表达式
#[inline]
pub fn record_malformed_logic() {
    metrics::counter!("malformed_logic_total").increment(1);
}
