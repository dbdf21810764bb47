//! 共享库
//!
//! 包含规则引擎各组件共用的配置加载和可观测性初始化代码。

pub mod config;
pub mod observability;
