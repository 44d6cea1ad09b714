//! Analysis report for an audio file
//!
//! Decodes a file, runs the full analysis, and prints the result. Handy
//! for checking what the player will see for a track without starting it.
//!
//! Usage: `tandem-analyze <audio-file>`

use anyhow::{Context, Result};

use tandem_analysis::analyze_track;
use tandem_core::config;
use tandem_core::decode::decode;

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .context("usage: tandem-analyze <audio-file>")?;

    let bytes = std::fs::read(&path).with_context(|| format!("failed to read {}", path))?;
    let track = decode(&bytes).with_context(|| format!("failed to decode {}", path))?;

    let cfg = config::load_config(&config::default_config_path());
    let result = analyze_track(&track, &cfg.analysis);

    println!("file:       {}", path);
    println!(
        "duration:   {:.1}s at {}Hz ({})",
        track.duration_seconds(),
        track.sample_rate(),
        if track.is_mono() { "mono" } else { "stereo" }
    );
    println!("bpm:        {:.1}", result.bpm);
    let (number, letter) = result.key.camelot();
    println!("key:        {} ({}{})", result.key, number, letter);
    println!("beats:      {}", result.beat_grid.len());
    if let Some(first) = result.beat_grid.first() {
        println!("first beat: {:.3}s", first);
    }

    Ok(())
}
