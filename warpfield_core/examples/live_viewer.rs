//! Warpfield Live Viewer
//!
//! Runs the field in real time and streams it to a Rerun viewer. A short
//! script stands in for the user: it orbits a little, then clicks a visible
//! node every few seconds so each warp plays out in full.

use std::time::Duration;
use warpfield_core::{AppConfig, RerunRenderer, WarpApp};
use warpfield_env::{channel_input, HostEvent, TokioContext};

const WARPS: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🌌 Warpfield Live Viewer");

    let (events, input) = channel_input();
    let renderer = RerunRenderer::spawn("Warpfield")?;
    let config = AppConfig::default();
    let frames_per_warp = (config.timing.total().as_secs_f64() * config.fps as f64) as u64 + 30;

    let mut app = WarpApp::new(TokioContext::shared(), input, renderer, config)?;

    // Settle the view before the first warp
    for _ in 0..30 {
        events.send(HostEvent::PointerDrag { dx: 4.0, dy: 0.0 })?;
        app.run(Some(1)).await?;
    }

    for warp in 0..WARPS {
        let Some((index, (x, y))) =
            (warp * 37..app.nodes().len()).find_map(|i| app.screen_position(i).map(|p| (i, p)))
        else {
            println!("No node in view, stopping");
            break;
        };

        println!("→ Warp {} toward node-{} at pixel ({:.0}, {:.0})", warp + 1, index, x, y);
        events.send(HostEvent::PointerMove { x, y })?;
        events.send(HostEvent::Click { x, y })?;
        app.run(Some(frames_per_warp)).await?;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("✅ Done ({} frames)", app.frame_count());
    Ok(())
}
