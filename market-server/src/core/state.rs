use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::Config;
use crate::fulfillment::FulfillmentDispatcher;
use crate::lock::LockCoordinator;
use crate::orders::expiry::{ExpiryJob, expiry_channel, spawn_expiry_worker};
use crate::orders::OrderManager;
use crate::payment::{CallbackProcessor, PaymentGateway};
use crate::services::SessionCache;
use crate::store::MarketStore;

/// 服务器状态 - 持有所有服务的单例引用
///
/// ServerState 是服务的核心数据结构，持有所有组件的共享引用。
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc<MarketStore> | 持久化存储 |
/// | locks | Arc<LockCoordinator> | 互斥锁协调器 |
/// | order_manager | Arc<OrderManager> | 订单生命周期管理 |
/// | payment_gateway | Arc<PaymentGateway> | 支付网关客户端 |
/// | callback_processor | Arc<CallbackProcessor> | 回调处理器 |
/// | session_cache | Arc<SessionCache> | 会员/购买状态缓存 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 持久化存储
    pub store: Arc<MarketStore>,
    /// 互斥锁协调器
    pub locks: Arc<LockCoordinator>,
    /// 订单生命周期管理
    pub order_manager: Arc<OrderManager>,
    /// 支付网关客户端
    pub payment_gateway: Arc<PaymentGateway>,
    /// 回调处理器
    pub callback_processor: Arc<CallbackProcessor>,
    /// 会员/购买状态缓存
    pub session_cache: Arc<SessionCache>,
    // Handed to the expiry worker on start_background_tasks
    expiry_rx: Arc<Mutex<Option<UnboundedReceiver<ExpiryJob>>>>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// # Panics
    ///
    /// 网关密钥加载失败时 panic
    pub fn initialize(config: &Config) -> Self {
        let store = Arc::new(MarketStore::new());
        let locks = Arc::new(LockCoordinator::new());
        let gateway = PaymentGateway::from_config(
            config.gateway.clone(),
            Arc::clone(&store),
            Arc::clone(&locks),
        )
        .expect("Failed to initialize payment gateway");
        Self::build(config.clone(), store, locks, gateway)
    }

    /// 组装服务器状态 (网关由调用方提供)
    pub fn build(
        config: Config,
        store: Arc<MarketStore>,
        locks: Arc<LockCoordinator>,
        gateway: PaymentGateway,
    ) -> Self {
        let (scheduler, expiry_rx) = expiry_channel();
        let order_manager = Arc::new(OrderManager::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::new(scheduler),
            config.order.clone(),
        ));
        let session_cache = Arc::new(SessionCache::new(Arc::clone(&store)));
        let payment_gateway = Arc::new(gateway);
        let dispatcher = Arc::new(FulfillmentDispatcher::standard(
            Arc::clone(&store),
            Arc::clone(&session_cache),
        ));
        let callback_processor = Arc::new(CallbackProcessor::new(
            Arc::clone(&store),
            Arc::clone(&payment_gateway),
            Arc::clone(&order_manager),
            dispatcher,
            Arc::clone(&locks),
            config.order.clone(),
        ));

        Self {
            config,
            store,
            locks,
            order_manager,
            payment_gateway,
            callback_processor,
            session_cache,
            expiry_rx: Arc::new(Mutex::new(Some(expiry_rx))),
        }
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 之前调用
    ///
    /// 启动的任务：
    /// - 订单超时关闭 worker
    pub fn start_background_tasks(&self) {
        if let Some(rx) = self.expiry_rx.lock().take() {
            spawn_expiry_worker(rx, Arc::clone(&self.order_manager));
        }
    }
}
