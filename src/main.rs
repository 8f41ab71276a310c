use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = matchbridge::cli::Cli::parse();
    if let Err(e) = matchbridge::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
