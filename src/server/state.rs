use std::path::PathBuf;
use std::sync::Arc;

use crate::IMDB;
use crate::cli::server::ServerCommand;
use crate::extractor::HttpExtractor;
use crate::feedback::Rocchio;

/// 应用状态
pub struct AppState {
    /// 数据库
    pub db: IMDB,
    /// 描述符服务
    pub extractor: HttpExtractor,
    /// 上传图片的保存目录
    pub uploads: PathBuf,
    /// 每张图片保存的相似图片数量
    pub k: usize,
    /// 默认的反馈参数
    pub rocchio: Rocchio,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: IMDB, extractor: HttpExtractor, opts: ServerCommand) -> Arc<Self> {
        let uploads = db.conf_dir().uploads();
        Arc::new(AppState {
            db,
            extractor,
            uploads,
            k: opts.rank.k,
            rocchio: opts.feedback.rocchio(),
            token: opts.token,
        })
    }
}
