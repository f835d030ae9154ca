use async_trait::async_trait;

use super::LinkSnapshot;

/// 缓存查询结果
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// 命中，快照有效期内
    Hit(LinkSnapshot),
    /// 未命中，需要回源
    Miss,
    /// 缓存不可用（连接失败等），调用方应降级为直接回源
    Unavailable,
}

/// 链接快照缓存接口
///
/// 所有实现都不向调用方传播基础设施错误：失败记录日志后
/// 返回 `Unavailable` 或静默丢弃写入，重定向路径不因缓存故障失败。
#[async_trait]
pub trait LinkCache: Send + Sync {
    /// 按 code 查询快照；命中时刷新 TTL
    async fn get(&self, code: &str) -> CacheLookup;

    /// 写入快照，设置固定 TTL
    async fn insert(&self, code: &str, snapshot: LinkSnapshot);

    /// 删除缓存快照（失效契约，由链接管理侧在可访问性变更时调用）
    async fn remove(&self, code: &str);

    fn backend_name(&self) -> &'static str;
}
