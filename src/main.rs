use clap::Parser;
use plyview::{config::Cli, flow};

fn main() -> anyhow::Result<()> {
    let config = Cli::parse().resolve();
    if config.check {
        let summary = flow::check(&config)?;
        println!("{summary}");
        return Ok(());
    }
    flow::run(config)
}
