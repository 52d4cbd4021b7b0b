//! circuit_breaker 模块测试

#[allow(unused_imports)]
pub mod integration;
