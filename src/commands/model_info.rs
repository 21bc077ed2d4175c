use crate::cli::ModelInfoArgs;
use crate::exit_codes;
use crate::output;
use anyhow::Context;
use ecg_link::{AnalysisClient, HttpAnalysisClient, LinkConfig};

pub async fn execute(args: ModelInfoArgs, config: &LinkConfig) -> i32 {
    let url = args.analysis_url.as_deref().unwrap_or(&config.analysis_url);

    match fetch(url).await {
        Ok(info) => match output::emit(&info, args.compact, None) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                exit_codes::EXECUTION_ERROR
            }
        },
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_codes::CONNECTION_ERROR
        }
    }
}

async fn fetch(url: &str) -> anyhow::Result<serde_json::Value> {
    let client = HttpAnalysisClient::new(url)?;
    client
        .model_info()
        .await
        .with_context(|| format!("Model info request to {} failed", client.base_url()))
}
