//! # 会话管理层
//!
//! 管理账号浏览器会话的完整生命周期：创建、认证、状态探测、无头/可见切换和资源回收。
//!
//! ## 主要功能
//! - **会话注册表**: 按账号键管理会话，同键创建互斥，异键创建完全并行
//! - **状态机**: Initializing → Ready ↔ Busy → Error/Closed，单会话同时只允许一个操作
//! - **可见性切换**: 在不丢失认证的前提下重建驱动并切换渲染模式
//! - **资源回收**: 关闭是幂等的，驱动优雅退出失败后强制终止
//!
//! ## 核心概念
//! - **Session**: 一个账号的浏览器会话，独占一个驱动
//! - **SessionRegistry**: 唯一的共享可变状态，锁只覆盖映射的结构性修改
//! - **OperationGuard**: 会话单操作槽位的 RAII 守卫
//!
//! ## 模块结构
//! - `session`: 会话状态与状态机实现
//! - `registry`: 会话注册表实现
//! - `visibility`: 无头/可见切换实现
//!
//! ## 使用示例
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_oxide::auth::{AuthMaterial, CookieJar};
//! use warden_oxide::config::Config;
//! use warden_oxide::driver::ChromeDriverFactory;
//! use warden_oxide::session::{SessionKey, SessionRegistry};
//!
//! # async fn example() -> Result<(), warden_oxide::Error> {
//! let config = Config::from_env()?;
//! let factory = Arc::new(ChromeDriverFactory::new(config.clone()));
//! let registry = SessionRegistry::new(config, factory);
//!
//! let key = SessionKey::from("100001234");
//! let material = AuthMaterial::cookies(CookieJar::new());
//! let session = registry.create(key.clone(), material, None, true).await?;
//! println!("Session ready: {:?}", session.summary());
//!
//! registry.close(&key).await?;
//! # Ok(())
//! # }
//! ```

pub mod registry;
pub mod session;
pub mod visibility;

#[cfg(test)]
pub mod tests;

pub use registry::SessionRegistry;
pub use session::{OperationGuard, Session, SessionKey, SessionStatus, SessionSummary};
pub use visibility::VisibilityToggler;
