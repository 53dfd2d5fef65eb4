use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use hyperspec_core::config::RegistrationConfig;
use hyperspec_core::crop::CropDb;
use hyperspec_core::filters::smooth_cube;
use hyperspec_core::io::{read_cube, save_preview_png, save_rgb_png, write_cube};
use hyperspec_core::registration::register_reported;

use crate::progress::BarReporter;
use crate::summary::{print_register_summary, print_result_summary, OutputPaths};

#[derive(Args)]
pub struct RegisterArgs {
    /// Destination (reference) cube
    pub dst: PathBuf,

    /// Source cube to align onto the destination
    pub src: PathBuf,

    /// Crop database (JSON) holding the region of interest per capture
    pub crops: PathBuf,

    /// Output path; the cube is written with a .hsc extension
    pub out: PathBuf,

    /// Capture ID to look up in the crop database (default: source file stem)
    #[arg(long)]
    pub capture_id: Option<String>,

    /// Gaussian sigma applied to every band before registration (0 = off)
    #[arg(long, default_value = "0.0")]
    pub smooth: f32,

    /// Registration config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save the keypoint match visualisation and a false-colour preview
    /// next to the output
    #[arg(long)]
    pub debug: bool,
}

/// Red, green and blue band indices for a false-colour preview: the last,
/// middle and first band.
fn false_colour_bands(bands: usize) -> (usize, usize, usize) {
    let last = bands.saturating_sub(1);
    (last, bands / 2, 0)
}

/// `<dir>/<stem><suffix>` for the output path's stem.
fn sibling(out: &Path, suffix: &str) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registered".to_string());
    out.with_file_name(format!("{stem}{suffix}"))
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let config: RegistrationConfig = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid registration config")?
    } else {
        RegistrationConfig::default()
    };

    let capture_id = match &args.capture_id {
        Some(id) => id.clone(),
        None => args
            .src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("Cannot derive a capture ID from the source path")?,
    };

    let crops = CropDb::load(&args.crops)
        .with_context(|| format!("Failed to read crop database {}", args.crops.display()))?;
    let bounds = crops.bounds(&capture_id)?;

    let paths = OutputPaths {
        cube: args.out.with_extension("hsc"),
        preview: sibling(&args.out, "-preview.png"),
        matches: args.debug.then(|| sibling(&args.out, "-matches.png")),
        colour: args.debug.then(|| sibling(&args.out, "-rgb.png")),
    };
    print_register_summary(args, &config, &capture_id, &bounds, &paths);

    let load = |path: &Path| -> Result<_> {
        let cube = read_cube(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let cube = cube.crop(&bounds)?;
        Ok(smooth_cube(&cube, args.smooth))
    };
    let dst_cube = load(&args.dst)?;
    let src_cube = load(&args.src)?;
    let dst_preview = dst_cube.preview();
    let src_preview = src_cube.preview();

    let reporter = Arc::new(BarReporter::new());
    let output = register_reported(
        &dst_preview,
        &dst_cube,
        &src_preview,
        &src_cube,
        &config,
        reporter.clone(),
    )?;
    reporter.finish();

    if let Some(ref path) = paths.matches {
        save_rgb_png(&output.matched_visual, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let registered = match output.outcome {
        Ok(registered) => registered,
        Err(failure) => bail!("Registration failed: {failure}"),
    };

    write_cube(&paths.cube, &registered.cube)
        .with_context(|| format!("Failed to write {}", paths.cube.display()))?;
    save_preview_png(&registered.preview, &paths.preview)
        .with_context(|| format!("Failed to write {}", paths.preview.display()))?;
    if let Some(ref path) = paths.colour {
        let (r, g, b) = false_colour_bands(registered.cube.bands());
        let rgb = registered.cube.rgb_preview(r, g, b)?;
        save_rgb_png(&rgb, path).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    print_result_summary(&output.stats, &registered, &paths);
    Ok(())
}
