//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查接口
//! - [`orders`] - 订单生命周期接口
//! - [`payment`] - 支付与回调接口

pub mod auth;
pub mod health;
pub mod orders;
pub mod payment;

pub use auth::CurrentUser;
