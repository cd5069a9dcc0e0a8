//! Market Server - 商城订单与支付结算服务
//!
//! # 架构概述
//!
//! 本模块是 Market Server 的主入口，提供以下核心功能：
//!
//! - **订单生命周期** (`orders`): 创建、取消、超时关闭、支付转移
//! - **支付网关** (`payment`): 预支付会话、回调验签解密、幂等结算
//! - **履约分发** (`fulfillment`): 按商品类型发货 (实物 / VIP / 设计授权)
//! - **存储** (`store`): 订单、支付、目录等领域表
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! market-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── orders/        # 订单生命周期和超时关闭
//! ├── payment/       # 网关客户端、加解密、回调处理
//! ├── fulfillment/   # 按商品类型的履约分发
//! ├── services/      # 会员/购买状态缓存
//! ├── store/         # 领域存储
//! ├── lock/cache     # 锁协调器与 TTL 缓存
//! └── utils/         # 日志等工具
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod fulfillment;
pub mod lock;
pub mod orders;
pub mod payment;
pub mod services;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use api::CurrentUser;
pub use core::{Config, Server, ServerState, build_router};
pub use orders::OrderManager;
pub use payment::{CallbackProcessor, PaymentGateway};
pub use store::MarketStore;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}
