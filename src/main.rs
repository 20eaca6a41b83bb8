use anyhow::{bail, Context};
use market_dashboard::{config_path, run, Command};
use std::path::PathBuf;

const USAGE: &str = "usage: market-dashboard <broad|detailed|recalc|repair|daemon> [--config PATH]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut command: Option<Command> = None;
    let mut config: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other if command.is_none() => {
                command = Some(other.parse().with_context(|| USAGE.to_string())?);
            }
            other => bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }

    let command = command.context(USAGE)?;
    run(command, config_path(config)).await?;
    Ok(())
}
