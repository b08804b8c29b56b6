//! # 认证层
//!
//! 驱动浏览器完成账号登录：Cookie 注入或凭证 + TOTP 两步验证，并对结果进行分类。
//!
//! ## 主要功能
//! - **Cookie 登录**: 注入存储的 Cookie 并刷新验证
//! - **凭证登录**: 按选择器策略填写表单并提交
//! - **两步验证**: 检测 2FA 提示，用共享密钥计算一次性验证码并提交
//! - **结果分类**: 每条失败路径都产生类型化结果，绝不静默吞掉
//!
//! ## 模块结构
//! - `material`: 认证材料值类型（Cookie 罐、凭证）
//! - `selectors`: 登录和两步验证各步骤的命名选择器策略
//! - `flow`: 认证流程状态机实现

pub mod flow;
pub mod material;
pub mod selectors;

pub use flow::{AuthenticationFlow, LoginOutcome, LoginState};
pub use material::{AuthMaterial, CookieJar, Credentials};
