use thiserror::Error;

/// 排序与反馈引擎的错误类型
///
/// 描述符无法比较的情况不会出现在这里，它由距离函数返回无穷大处理；
/// 描述符服务不可用也不会出现在这里，它会退化为空描述符。
#[derive(Debug, Error)]
pub enum Error {
    /// 引用的图片不存在
    #[error("图片不存在: {0}")]
    NotFound(i64),
    /// 读写数据库失败
    #[error("数据库错误: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("数据库迁移失败: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    /// 调用方取消了请求，没有写入任何数据
    #[error("请求已取消")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
