//! # 驱动层
//!
//! 管理浏览器自动化驱动的生命周期，基于 Chrome DevTools Protocol 实现导航、元素交互和截图。
//!
//! ## 主要功能
//! - **驱动启动**: 按会话启动独立的 Chrome 进程（无头/可见、代理、自动化隐藏参数）
//! - **协议通信**: 通过 WebSocket 发送 DevTools 命令并接收响应
//! - **元素交互**: 按选择器策略查找、点击和输入
//! - **Cookie 管理**: 读取和写入浏览器 Cookie
//! - **资源回收**: 优雅退出，超时后强制终止进程
//!
//! ## 核心概念
//! - **DriverHandle**: 一个驱动进程/连接的独占所有权句柄
//! - **DriverFactory**: 驱动构建的接缝，测试中替换为 Mock 实现
//!
//! ## 模块结构
//! - `traits`: 驱动层的核心 trait 定义
//! - `types`: DevTools 协议相关的数据类型
//! - `connection`: WebSocket 连接实现
//! - `client`: 类型化 DevTools 客户端
//! - `launcher`: Chrome 进程启动与工厂实现
//! - `handle`: 驱动句柄实现
//! - `mock`: 用于测试的 Mock 实现

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod launcher;
pub mod handle;
pub mod mock;

pub use traits::{
    Cookie, DriverFactory, DriverHandle, ElementInfo, EvaluationResult, LaunchSpec,
    NavigationResult, Selector, SelectorStrategy,
};

// Re-export implementation structs
pub use client::CdpClient;
pub use connection::CdpConnection;
pub use handle::CdpDriverHandle;
pub use launcher::ChromeDriverFactory;

// Re-export mock for development/testing
pub use mock::{MockDriver, MockDriverFactory};

use std::time::Duration;

use crate::Result;

/// Poll a list of named selector strategies until one resolves or the bound
/// expires.
///
/// Returns the index of the first strategy that matched together with the
/// element it found, or `None` when the wait expires without a match.
/// Transport errors abort the wait immediately.
pub async fn wait_for_any(
    driver: &dyn DriverHandle,
    strategies: &[SelectorStrategy],
    timeout: Duration,
) -> Result<Option<(usize, ElementInfo)>> {
    let poll_interval = Duration::from_millis(100);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        for (index, strategy) in strategies.iter().enumerate() {
            if let Some(element) = driver.find_element(&strategy.selector).await? {
                return Ok(Some((index, element)));
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_any_finds_later_strategy() {
        let driver = MockDriver::new(true);
        let strategies = vec![
            SelectorStrategy::new("first", Selector::css("#missing")),
            SelectorStrategy::new("second", Selector::css("#present")),
        ];
        driver.insert_element(&Selector::css("#present"), "hello");

        let hit = wait_for_any(&driver, &strategies, Duration::from_millis(500))
            .await
            .unwrap();
        let (index, element) = hit.expect("element should be found");
        assert_eq!(index, 1);
        assert_eq!(element.text, "hello");
    }

    #[tokio::test]
    async fn test_wait_for_any_expires() {
        let driver = MockDriver::new(true);
        let strategies = vec![SelectorStrategy::new("only", Selector::css("#missing"))];

        let hit = wait_for_any(&driver, &strategies, Duration::from_millis(150))
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_any_propagates_transport_error() {
        let driver = MockDriver::new(true);
        driver.quit().await.unwrap();
        let strategies = vec![SelectorStrategy::new("only", Selector::css("#x"))];

        let result = wait_for_any(&driver, &strategies, Duration::from_millis(100)).await;
        assert!(result.is_err());
    }
}
