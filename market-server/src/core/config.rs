/// 服务器配置 - 市场后端的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
/// | ORDER_EXPIRE_MINUTES | 30 | 未支付订单有效期(分钟) |
/// | GATEWAY_BASE_URL | https://api.pay.example.com | 支付网关地址 |
///
/// # 示例
///
/// ```ignore
/// HTTP_PORT=8080 ORDER_EXPIRE_MINUTES=15 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 日志目录 (可选)
    pub log_dir: Option<String>,
    /// 订单相关配置
    pub order: OrderConfig,
    /// 支付网关配置
    pub gateway: GatewayConfig,
}

/// 订单生命周期配置：有效期与各类锁预算
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// 未支付订单有效期 (分钟)
    pub expire_minutes: i64,
    /// 创建锁 TTL (秒)
    pub create_lock_ttl_secs: u64,
    /// 创建锁最大等待 (秒)
    pub create_lock_wait_secs: u64,
    /// 订单变更锁 TTL (秒)
    pub modify_lock_ttl_secs: u64,
    /// 订单变更锁最大等待 (秒)
    pub modify_lock_wait_secs: u64,
    /// 支付回调锁 TTL (秒)
    pub callback_lock_ttl_secs: u64,
    /// 支付回调锁最大等待 (秒)
    pub callback_lock_wait_secs: u64,
    /// 关单回调锁 TTL (秒)
    pub closed_lock_ttl_secs: u64,
    /// 关单回调锁最大等待 (秒)
    pub closed_lock_wait_secs: u64,
    /// 订单详情缓存 TTL (秒)
    pub detail_cache_ttl_secs: u64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            expire_minutes: 30,
            create_lock_ttl_secs: 10,
            create_lock_wait_secs: 5,
            modify_lock_ttl_secs: 10,
            modify_lock_wait_secs: 5,
            callback_lock_ttl_secs: 30,
            callback_lock_wait_secs: 10,
            closed_lock_ttl_secs: 10,
            closed_lock_wait_secs: 5,
            detail_cache_ttl_secs: 300,
        }
    }
}

/// 支付网关配置
///
/// 私钥用于出站请求签名，平台公钥用于回调验签，
/// API v3 密钥 (32 字节) 用于回调资源 AES-256-GCM 解密。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 应用 ID
    pub app_id: String,
    /// 商户号
    pub merchant_id: String,
    /// API v3 密钥 (必须 32 字节)
    pub api_v3_key: String,
    /// 商户私钥证书序列号
    pub key_serial: String,
    /// 回调通知地址
    pub notify_url: String,
    /// 商户私钥 PEM 路径
    pub private_key_path: String,
    /// 平台公钥 PEM 路径
    pub platform_key_path: String,
    /// 网关基础地址
    pub base_url: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            order: OrderConfig {
                expire_minutes: std::env::var("ORDER_EXPIRE_MINUTES")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(30),
                ..OrderConfig::default()
            },
            gateway: GatewayConfig {
                app_id: std::env::var("GATEWAY_APP_ID").unwrap_or_else(|_| "app-dev".into()),
                merchant_id: std::env::var("GATEWAY_MERCHANT_ID")
                    .unwrap_or_else(|_| "mch-dev".into()),
                api_v3_key: std::env::var("GATEWAY_API_V3_KEY")
                    .unwrap_or_else(|_| "0123456789abcdef0123456789abcdef".into()),
                key_serial: std::env::var("GATEWAY_KEY_SERIAL")
                    .unwrap_or_else(|_| "serial-dev".into()),
                notify_url: std::env::var("GATEWAY_NOTIFY_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/payment/notify".into()),
                private_key_path: std::env::var("GATEWAY_PRIVATE_KEY_PATH")
                    .unwrap_or_else(|_| "certs/merchant_key.pem".into()),
                platform_key_path: std::env::var("GATEWAY_PLATFORM_KEY_PATH")
                    .unwrap_or_else(|_| "certs/platform_pub.pem".into()),
                base_url: std::env::var("GATEWAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.pay.example.com".into()),
            },
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_config_defaults() {
        let cfg = OrderConfig::default();
        assert_eq!(cfg.expire_minutes, 30);
        assert_eq!(cfg.create_lock_ttl_secs, 10);
        assert_eq!(cfg.create_lock_wait_secs, 5);
        assert_eq!(cfg.callback_lock_ttl_secs, 30);
        assert_eq!(cfg.callback_lock_wait_secs, 10);
    }
}
