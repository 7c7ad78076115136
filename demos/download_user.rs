//! Download one user's collection
//!
//! This example demonstrates the core functionality of unsplash-dl:
//! - Building the credential pool from the environment or a properties file
//! - Creating a downloader instance
//! - Subscribing to events
//! - Running a session that stops cleanly on Ctrl+C
//!
//! Usage: `UNSPLASH_ACCESS_TOKENS=key1,key2 cargo run --example download_user -- <username>`

use std::sync::Arc;
use unsplash_dl::config::{Config, DownloadConfig, ImageQuality};
use unsplash_dl::{CredentialPool, Event, PhotoDownloader, SessionOutcome, run_until_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let username = std::env::args().nth(1).ok_or("usage: download_user <username>")?;

    let mut config = Config {
        download: DownloadConfig {
            download_dir: format!("downloads/{username}").into(),
            ..Default::default()
        },
        ..Default::default()
    };
    config.api.image_quality = ImageQuality::Full;

    let pool = Arc::new(CredentialPool::from_config(&config.credentials));
    println!("{} access key(s) loaded", pool.len());

    let downloader = PhotoDownloader::new(config, pool.clone())?;

    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TotalDiscovered { username, total } => {
                    println!("{username} has {total} photos");
                }
                Event::PhotoCompleted {
                    file_name,
                    completed,
                    total,
                    ..
                } => {
                    println!("[{completed}/{total}] {file_name}");
                }
                Event::PhotoRecovered { file_name, .. } => {
                    println!("found on disk: {file_name}");
                }
                Event::Error { photo_id, error } => match photo_id {
                    Some(id) => eprintln!("photo {id} failed: {error}"),
                    None => eprintln!("session failed: {error}"),
                },
                _ => {}
            }
        }
    });

    let report = run_until_signal(&downloader, &username).await?;
    println!(
        "downloaded {} new, {} already present, {} failed ({} of {} total)",
        report.downloaded,
        report.already_present,
        report.failed,
        report.downloaded_total,
        report.total_photos
    );

    match report.outcome {
        SessionOutcome::Complete => println!("collection complete"),
        SessionOutcome::Cancelled => println!("stopped; run again to resume"),
        SessionOutcome::QuotaExhausted { next_reset } => match next_reset {
            Some(at) => println!("out of quota; run again after {at}"),
            None => println!("no usable access keys configured"),
        },
    }

    for status in pool.statuses() {
        println!(
            "  {} {}/{}{}",
            status.key_preview,
            status.usage,
            status.hourly_limit,
            if status.rate_limited { " (rate limited)" } else { "" }
        );
    }

    Ok(())
}
