//! 字段规则演示程序
//!
//! 加载字段目录和一组演示上下文，逐个上下文打印每个字段的可见性和校验结果。

use anyhow::{Context, Result};
use field_rules::{EvaluationContext, FieldCatalog};
use form_shared::config::AppConfig;
use form_shared::observability;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// 演示上下文
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedContext {
    label: String,
    context: Value,
    /// 校验时叠加在上下文上的表单值，缺省时所有字段均为空字符串
    #[serde(default)]
    form_values: Option<Value>,
}

fn main() -> Result<()> {
    let config = AppConfig::load("field-rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    info!("Starting field rule evaluation...");

    let catalog = FieldCatalog::new();
    let fields_json = read_file(&config.catalog.fields_path)?;
    let loaded = catalog
        .load_catalog_json(&fields_json)
        .context("Failed to parse field catalogue")?;
    info!("Loaded {} fields", loaded.len());

    let contexts: Vec<NamedContext> = serde_json::from_str(&read_file(&config.catalog.contexts_path)?)
        .context("Failed to parse contexts")?;

    let blank_form = blank_form_values(&loaded);
    let executor = catalog.executor();
    let fields = catalog.list_all();
    let name_width = loaded.iter().map(String::len).max().unwrap_or(4).max(4);

    for named in &contexts {
        let context = EvaluationContext::new(named.context.clone());
        let form_context = context.with_overrides(named.form_values.as_ref().unwrap_or(&blank_form));

        println!("\n--- Context: {} ---", named.label);
        println!("{:<name_width$}  {:<7}  error", "name", "visible");

        for compiled in &fields {
            let visible = executor.is_visible(&context, compiled.field());
            let error = executor.validate(&form_context, compiled.field());

            println!(
                "{:<name_width$}  {:<7}  {}",
                compiled.name(),
                visible,
                error.as_deref().unwrap_or("-")
            );
        }
    }

    info!("Evaluated {} contexts", contexts.len());
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// 所有字段值为空字符串的表单
fn blank_form_values(names: &[String]) -> Value {
    let values: Map<String, Value> = names
        .iter()
        .map(|name| (name.clone(), Value::String(String::new())))
        .collect();
    Value::Object(values)
}
