use crate::cli::MonitorArgs;
use crate::exit_codes;
use ecg_link::{DeviceLink, Lead, LinkConfig};
use std::time::Duration;

pub async fn execute(args: MonitorArgs, config: &LinkConfig) -> i32 {
    let lead = match Lead::try_from(args.lead) {
        Ok(lead) => lead,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INVALID_INPUT;
        }
    };

    let link = DeviceLink::new(config);
    link.on_connection_changed(|connected| {
        if connected {
            eprintln!("Connected to device");
        } else {
            eprintln!("Not connected to device");
        }
    });
    link.on_error(|message| eprintln!("Error: {}", message));
    link.on_status(|status| eprintln!("Device status: {:?}", status));

    if let Err(code) = super::connect(&link, args.address).await {
        return code;
    }

    if let Err(e) = link.select_lead(lead).await {
        eprintln!("Error: {}", e);
    }

    let deadline = async {
        match args.seconds {
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                let live = link.live_window(lead);
                let min = live.iter().min().copied().unwrap_or_default();
                let max = live.iter().max().copied().unwrap_or_default();
                println!(
                    "{} [{:?}] live={} min={} max={} captured={}",
                    lead,
                    link.state(),
                    live.len(),
                    min,
                    max,
                    link.captured(lead).len()
                );
            }
        }
    }

    link.disconnect().await;
    exit_codes::SUCCESS
}
