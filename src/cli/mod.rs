mod add;
mod feedback;
mod import;
mod query;
mod rank;
pub mod server;
mod similar;

pub use add::*;
pub use feedback::*;
pub use import::*;
pub use query::*;
pub use rank::*;
pub use server::*;
pub use similar::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
