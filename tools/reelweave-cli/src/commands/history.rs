//! List past renders of a channel.

use reelweave_common::config::AppConfig;
use reelweave_timeline_model::channel::ChannelConfigStore;
use reelweave_timeline_model::history::RenderHistory;

pub fn run(config: &AppConfig, channel: String) -> anyhow::Result<()> {
    let store = ChannelConfigStore::new(&config.paths);
    let history = RenderHistory::new(store.history_dir(&channel)?);
    let entries = history.entries()?;

    println!("Render history for {channel}: {} render(s)", entries.len());
    for entry in &entries {
        let total: f64 = entry.clips.iter().map(|clip| clip.duration).sum();
        let output = entry
            .out_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:>3} clip(s)  {:>8.2}s  {output}",
            entry.datetime,
            entry.clips.len(),
            total
        );
    }
    Ok(())
}
