use clap::Parser;
use imrank::Opts;
use imrank::cli::SubCommandExtend;
use imrank::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Import(config) => config.run(&opts).await,
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Rank(config) => config.run(&opts).await,
        SubCommand::Similar(config) => config.run(&opts).await,
        SubCommand::Query(config) => config.run(&opts).await,
        SubCommand::Feedback(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
