//! Export a spec as an XMEML sequence.

use std::path::PathBuf;

use reelweave_common::config::AppConfig;
use reelweave_render_engine::probe::FfprobeProbe;
use reelweave_render_engine::xmeml::XmemlEmitter;
use reelweave_timeline_model::media::MediaCatalog;
use reelweave_timeline_model::spec::RenderSpec;

pub fn run(
    config: &AppConfig,
    spec_path: PathBuf,
    output: Option<PathBuf>,
    name: Option<String>,
) -> anyhow::Result<()> {
    println!("Exporting XMEML for spec: {}", spec_path.display());

    let spec = RenderSpec::load(&spec_path)?;
    let probe = FfprobeProbe::new(&config.render.ffprobe_bin);
    let assets = spec.timeline.asset_paths();
    let catalog = MediaCatalog::probe_all(&probe, assets.iter().map(PathBuf::as_path));

    let name = name.unwrap_or_else(|| {
        spec.out_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reelweave".to_string())
    });
    let document = XmemlEmitter::new(&catalog)
        .with_name(&name)
        .compile(&spec.timeline)?;

    let output = output.unwrap_or_else(|| spec.out_path.with_extension("xml"));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, document)?;

    println!("  Sequence: {name}");
    println!("  Assets probed: {}", catalog.len());
    println!("\nXMEML written: {}", output.display());
    Ok(())
}
