use doodwatch::{
    config::{CliArgs, WatchConfig},
    pipeline, telemetry,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = CliArgs::from_args(&args)?;
    telemetry::init(cli.verbose);

    let config = WatchConfig::load(&cli.config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(pipeline::run(config))
}
