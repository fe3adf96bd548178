use start_cli::{cli, commands, logging};
use start_core::ExitStatus;

#[tokio::main]
async fn main() {
    let matches = cli::command().get_matches();
    logging::init(matches.get_flag("verbose"), matches.get_flag("log-json"));

    let status = match commands::run(&matches).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitStatus::Error
        }
    };
    std::process::exit(status.code());
}
