//! Occupancy monitor binary.
//!
//! Reads detector output as JSON lines from a file argument (or stdin) and
//! drives it through the frame pipeline, with the historical recorder and
//! zone sync running in the background.

use std::sync::Arc;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crowd_monitor::logging::init_tracing;
use crowd_monitor::{
    AlertManager, FrameInput, FramePipeline, HistoricalRecorder, MonitorConfig, StateBoard,
    ZoneSyncService,
};
use crowd_store::{InMemoryStore, ZoneFileStore, ZoneStore};
use crowd_tracking::AreaRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting crowd-monitor");

    let config = MonitorConfig::from_env();
    info!("Monitor config: {:?}", config);

    let zone_store: Arc<dyn ZoneStore> = Arc::new(ZoneFileStore::new(&config.zone_dir));
    let store = Arc::new(InMemoryStore::with_threshold(config.default_threshold));

    let registry = Arc::new(AreaRegistry::new(config.tracker.clone(), Arc::clone(&zone_store)));
    let board = Arc::new(StateBoard::new());
    let alerts = Arc::new(AlertManager::new(
        store.clone(),
        store.clone(),
        config.alert_cooldown,
        config.persist_timeout,
    ));
    let pipeline = Arc::new(FramePipeline::new(registry, Arc::clone(&board), alerts));

    for area in &config.areas {
        pipeline.register_area(area);
    }

    let recorder = config.enable_recorder.then(|| {
        HistoricalRecorder::new(
            board.clone(),
            Arc::clone(&zone_store),
            store.clone(),
            config.record_interval,
            config.persist_timeout,
        )
        .spawn()
    });
    let zone_sync = ZoneSyncService::new(Arc::clone(&pipeline), config.zone_sync_interval).spawn();

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            let file = File::open(&path)
                .await
                .with_context(|| format!("Failed to open frame file {}", path))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = input.lines();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frames = 0u64;
    let mut malformed = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => match FrameInput::parse_line(&line) {
                        Ok(Some(frame)) => {
                            pipeline.process_frame(&frame.area, &frame.detections).await;
                            frames += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            malformed += 1;
                            warn!(error = %e, "Skipping malformed frame line");
                        }
                    },
                    Ok(None) => {
                        info!("End of input");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
        }
    }

    zone_sync.shutdown().await;
    if let Some(recorder) = recorder {
        recorder.shutdown().await;
    }

    for state in board.snapshot_all() {
        info!(
            area = %state.area,
            status = state.status.as_str(),
            live_people = state.live_people,
            zone_counts = ?state.zone_counts,
            "Final area state"
        );
    }

    let active_alerts = pipeline.alerts().active_alerts(None).await?;
    info!(
        frames,
        malformed,
        active_alerts = active_alerts.len(),
        history_rows = store.snapshots().len(),
        "crowd-monitor shutdown complete"
    );

    Ok(())
}
