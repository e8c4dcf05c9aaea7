use {
    clap::Parser,
    deployer::{
        Config, Deployer, SendOptions,
        arguments::{Arguments, Command},
        linker,
    },
};

#[tokio::main]
async fn main() {
    let args = Arguments::parse();
    observe::tracing::initialize(&args.log_filter, args.log_stderr_threshold);
    if let Err(err) = run(args).await {
        tracing::error!(?err, "deployment failed");
        std::process::exit(1);
    }
}

async fn run(args: Arguments) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let mut deployer = Deployer::new(config)?;
    match args.command {
        Command::Deploy {
            name,
            file,
            libraries,
        } => {
            deployer.compile_file(&name, file.as_deref())?;
            if !libraries.is_empty() {
                let libraries = libraries.iter().map(String::as_str).collect::<Vec<_>>();
                let report = deployer.link(&name, &libraries)?;
                anyhow::ensure!(
                    report.is_fully_resolved(),
                    "unresolved link references: {:?}",
                    report.unresolved(),
                );
            }
            let deployment = deployer.deploy(&name, &[]).await?;
            tracing::info!(address = ?deployment.address, "done");
        }
        Command::Send { name, data, value } => {
            let data = hex::decode(data.trim_start_matches("0x"))?;
            deployer
                .send(
                    &name,
                    data,
                    SendOptions {
                        value: value.into(),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Command::Attach { name, address } => {
            let address = address
                .as_deref()
                .map(linker::parse_address)
                .transpose()?;
            let contract = deployer.deployed(&name, address)?;
            tracing::info!(address = ?contract.address, "attached");
        }
    }
    Ok(())
}
