//! Check system capabilities.

use reelweave_common::config::{config_file_path, AppConfig};
use reelweave_render_engine::runner::command_exists;
use reelweave_timeline_model::channel::ChannelConfigStore;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelweave System Check");
    println!("{}", "=".repeat(50));

    let render = &config.render;
    let mut all_required_ok = true;
    for (label, bin) in [("Encoder", &render.ffmpeg_bin), ("Probe", &render.ffprobe_bin)] {
        if command_exists(bin) {
            println!("[OK] {label}: {bin}");
        } else {
            println!("[FAIL] {label}: {bin} not found in PATH");
            all_required_ok = false;
        }
    }
    println!(
        "[OK] Video encoder: {} ({}x{}, batch above {} clips)",
        render.encoder.codec_name(),
        render.width,
        render.height,
        render.batch_threshold
    );

    println!();
    println!("Config file: {}", config_file_path().display());
    let paths = &config.paths;
    for (label, dir) in [
        ("Channels", &paths.channels_dir),
        ("Clips", &paths.clips_dir),
        ("Output", &paths.output_dir),
        ("Temp", &paths.temp_dir),
    ] {
        let status = if dir.is_dir() { "OK" } else { "WARN" };
        println!("[{status}] {label}: {}", dir.display());
    }

    match ChannelConfigStore::new(paths).list_channels() {
        Ok(channels) if !channels.is_empty() => {
            println!("[OK] Channels: {}", channels.join(", "));
        }
        Ok(_) => println!("[WARN] Channels: none configured"),
        Err(e) => println!("[WARN] Channels: {e}"),
    }

    println!();
    if all_required_ok {
        println!("All required tools are available. Reelweave is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set render.ffmpeg_bin / render.ffprobe_bin.");
    }

    Ok(())
}
