use crate::cli::RecordArgs;
use crate::exit_codes;
use crate::output;
use anyhow::Context;
use chrono::{DateTime, Utc};
use ecg_link::{
    AnalysisClient, AnalysisRequest, DeviceLink, Diagnosis, HttpAnalysisClient, Lead,
    LeadSnapshot, LinkConfig,
};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct RecordOutput {
    address: String,
    recorded_at: DateTime<Utc>,
    sampling_rate: u32,
    duration_secs: u64,
    leads: LeadSnapshot,
    diagnosis: Option<Diagnosis>,
}

pub async fn execute(args: RecordArgs, config: &LinkConfig) -> i32 {
    let leads = match args
        .leads
        .iter()
        .map(|&n| Lead::try_from(n))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(leads) => leads,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INVALID_INPUT;
        }
    };

    let duration = args
        .duration
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.recording_duration());
    let duration_secs = duration.as_secs();

    let link = DeviceLink::new(config);
    link.on_error(|message| eprintln!("Error: {}", message));
    link.on_connection_changed(|connected| {
        if !connected {
            eprintln!("Connection to device lost");
        }
    });

    let address = match super::connect(&link, args.address).await {
        Ok(address) => address,
        Err(code) => return code,
    };

    for lead in leads {
        if let Err(code) = record_lead(&link, lead, duration).await {
            link.disconnect().await;
            return code;
        }
    }

    let snapshot = link.snapshot();
    link.disconnect().await;

    let diagnosis = if args.analyze {
        match analyze(&snapshot, config, args.analysis_url.as_deref()).await {
            Ok(diagnosis) => Some(diagnosis),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        None
    };

    let result = RecordOutput {
        address: address.to_string(),
        recorded_at: Utc::now(),
        sampling_rate: config.sampling_rate,
        duration_secs,
        leads: snapshot,
        diagnosis,
    };

    match output::emit(&result, args.compact, args.output.as_deref()) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}

/// Record one lead for `duration`; the cutoff timer lives here, not in the link
async fn record_lead(link: &DeviceLink, lead: Lead, duration: Duration) -> Result<(), i32> {
    let started = match link.select_lead(lead).await {
        Ok(()) => link.start_recording().await,
        Err(e) => Err(e),
    };
    if let Err(e) = started {
        eprintln!("Error: failed to start {}: {}", lead, e);
        return Err(exit_codes::CONNECTION_ERROR);
    }

    eprintln!("Recording {} for {}s...", lead, duration.as_secs());

    let interrupted = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    if let Err(e) = link.stop_recording().await {
        log::warn!("STOP not delivered for {}: {}", lead, e);
    }
    let _ = link.sync().await;

    let captured = link.captured(lead).len();
    if interrupted {
        eprintln!("Recording interrupted");
        return Err(exit_codes::EXECUTION_ERROR);
    }
    if captured == 0 {
        eprintln!(
            "Error: Please complete a full {}-second recording for {}",
            duration.as_secs(),
            lead
        );
        return Err(exit_codes::EXECUTION_ERROR);
    }

    eprintln!("{}: {} samples", lead, captured);
    Ok(())
}

async fn analyze(
    snapshot: &LeadSnapshot,
    config: &LinkConfig,
    url: Option<&str>,
) -> anyhow::Result<Diagnosis> {
    let request = AnalysisRequest::from_snapshot(snapshot, config.sampling_rate)?;
    let client = HttpAnalysisClient::new(url.unwrap_or(&config.analysis_url))?;
    let diagnosis = client
        .analyze(&request)
        .await
        .context("Analysis request failed")?;
    Ok(diagnosis)
}
