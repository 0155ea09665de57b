use std::path::Path;

use futures::stream::BoxStream;
use log::info;
use sqlx::{SqlitePool, sqlite::*};

use crate::ranker::{Candidate, CandidateSource};

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开数据库并执行迁移
///
/// WAL 模式下读写互不阻塞，排序扫描期间可以并发插入新图片。
pub async fn init_db(filename: impl AsRef<Path>, wal: bool) -> crate::Result<Database> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    let journal_mode = match wal {
        true => SqliteJournalMode::Wal,
        false => SqliteJournalMode::Delete,
    };
    let options = SqliteConnectOptions::new()
        .journal_mode(journal_mode)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    info!("检查数据库迁移");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

impl CandidateSource for SqlitePool {
    type Error = crate::Error;

    fn candidates(
        &self,
        exclude: Option<i64>,
        projection: Projection,
    ) -> BoxStream<'_, crate::Result<Candidate>> {
        crud::stream_candidates(self, exclude, projection)
    }
}
