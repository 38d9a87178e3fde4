use std::io;
use std::time::Instant;

use clap::Parser;
use log::{error, info};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

use heart_hypotheses::cli::{init_logger, HeartArgs};
use heart_hypotheses::{analyze, AnalysisError, LocalRepository};

/// Resident memory of this process in bytes, 0 when it cannot be read.
fn monitor_memory() -> u64 {
    let pid = match get_current_pid() {
        Ok(pid) => pid,
        Err(_) => return 0,
    };
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map_or(0, |p| p.memory())
}

#[tokio::main]
async fn main() -> Result<(), AnalysisError> {
    let args = HeartArgs::parse();
    init_logger(args.verbose);

    let start_time = Instant::now();
    let start_memory = monitor_memory();

    let provider = LocalRepository::new(args.data_dir.clone());
    let report = match analyze(
        &provider,
        args.dataset_id,
        &args.config(),
        args.export.as_deref(),
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            error!("Analysis of dataset {} aborted: {}", args.dataset_id, e);
            return Err(e);
        }
    };

    report.write(args.format, io::stdout().lock())?;

    let end_memory = monitor_memory();
    info!("Time elapsed: {:?}", start_time.elapsed());
    info!(
        "Memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );

    Ok(())
}
