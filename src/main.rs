use anyhow::Result;
use clap::Parser;
use sb2_import_core::cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    sb2_import_core::run_cli(&args).await
}
