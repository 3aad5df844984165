use homenote_cli::{build_cli, logging, run};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    logging::init(matches.get_flag("verbose"));

    if let Err(e) = run(&matches).await {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
