//! 测试模块根目录
//!
//! 导出所有功能模块的测试

#[allow(unused_imports)]
pub mod circuit_breaker;
#[allow(unused_imports)]
pub mod config;
