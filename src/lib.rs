pub mod cli;
pub mod config;
pub mod db;
pub mod descriptor;
pub mod distance;
mod error;
pub mod extractor;
pub mod feedback;
pub mod imdb;
mod metrics;
pub mod ranker;
mod server;
pub mod utils;
pub mod weights;

pub use config::Opts;
pub use error::{Error, Result};
pub use imdb::{IMDB, IMDBBuilder};
