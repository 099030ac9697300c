use anyhow::Context;
use clap::Parser;
use drive_fs::utils::{error::ErrorSeverity, logger, validation::Validate};
use drive_fs::{
    DirectoryInfo, DriveFileSystem, FileInfo, FileSystemInfo, GraphClient, HashAlgorithm,
    HashProvider, ListArgs,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

async fn run(args: &ListArgs, ct: &CancellationToken) -> anyhow::Result<()> {
    let config = args.load_config()?;
    config.validate()?;

    let algorithm = HashAlgorithm::from_name(&args.algorithm)
        .with_context(|| format!("unsupported hash algorithm '{}'", args.algorithm))?;

    let client = GraphClient::from_config(&config)?;
    let fs = Arc::new(DriveFileSystem::from_config(client, &config));

    let entry = fs
        .get_item(&args.path, ct)
        .await?
        .with_context(|| format!("nothing found at '{}'", args.path))?;

    let entries = if entry.is_directory() {
        entry.get_items(ct).await?
    } else {
        vec![entry]
    };

    tracing::info!("📂 {} entries under '{}'", entries.len(), args.path);
    for entry in &entries {
        let hash = entry
            .get_hash(algorithm.name())
            .map(|bytes| hex(&bytes))
            .unwrap_or_else(|| "-".to_string());
        let kind = if entry.is_directory() { "d" } else { "f" };

        println!(
            "{} {:>12} {} {} {}",
            kind,
            entry.length(),
            entry.last_write_time_utc().format("%Y-%m-%d %H:%M:%S"),
            hash,
            entry.full_name()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = ListArgs::parse();

    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::debug!("List args: {:?}", args);

    let ct = CancellationToken::new();
    let interrupt = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    if let Err(e) = run(&args, &ct).await {
        match e.downcast_ref::<drive_fs::DriveError>() {
            Some(drive_error) => {
                tracing::error!(
                    "❌ Listing failed: {} (Severity: {:?})",
                    drive_error,
                    drive_error.severity()
                );
                if drive_error.severity() == ErrorSeverity::Critical {
                    tracing::error!("💡 Check the [drive] configuration or DRIVE_* variables");
                }
                eprintln!("❌ {}", drive_error.user_friendly_message());
            }
            None => {
                tracing::error!("❌ Listing failed: {:#}", e);
                eprintln!("❌ {:#}", e);
            }
        }
        std::process::exit(1);
    }
}
