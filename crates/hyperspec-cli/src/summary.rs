use std::path::PathBuf;

use console::Style;
use hyperspec_core::config::RegistrationConfig;
use hyperspec_core::crop::CropRect;
use hyperspec_core::registration::{Registered, RegistrationStats};

use crate::commands::register::RegisterArgs;

/// Files written by `register`.
pub struct OutputPaths {
    pub cube: PathBuf,
    pub preview: PathBuf,
    pub matches: Option<PathBuf>,
    pub colour: Option<PathBuf>,
}

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_register_summary(
    args: &RegisterArgs,
    config: &RegistrationConfig,
    capture_id: &str,
    bounds: &CropRect,
    paths: &OutputPaths,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Hyperspec Registration"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(22)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Destination"),
        s.path.apply_to(args.dst.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Source"),
        s.path.apply_to(args.src.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Capture"),
        s.value.apply_to(capture_id)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Crop"),
        s.value.apply_to(format!(
            "{}x{} at ({}, {})",
            bounds.width, bounds.height, bounds.x, bounds.y
        ))
    );
    if args.smooth > 0.0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Smoothing"),
            s.value.apply_to(format!("sigma {:.2}", args.smooth))
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Smoothing"),
            s.disabled.apply_to("off")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Features"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Keypoints"),
        s.value.apply_to(config.orb.n_features)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Pyramid"),
        s.value.apply_to(format!(
            "{} levels x{:.2}",
            config.orb.n_levels, config.orb.scale_factor
        ))
    );
    println!(
        "    {:<12}{} {}",
        s.label.apply_to("Score"),
        s.method.apply_to(config.orb.score),
        s.method.apply_to(config.orb.wta_k)
    );
    println!(
        "    {:<12}{}{}",
        s.label.apply_to("Matcher"),
        s.method.apply_to(config.matcher.norm),
        if config.matcher.cross_check {
            s.label.apply_to(" (cross-check)").to_string()
        } else {
            String::new()
        }
    );
    println!();

    println!("  {}", s.header.apply_to("Homography"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("RANSAC"),
        s.value.apply_to(format!(
            "{:.1} px, {} iterations max",
            config.ransac.reproj_threshold, config.ransac.max_iterations
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Area"),
        s.value.apply_to(format!(
            "\u{00b1}{:.0}%",
            config.validation.area_tolerance * 100.0
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Perspective"),
        s.value.apply_to(format!("\u{2264}{}", config.validation.max_perspective))
    );
    if config.crop_registered {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Crop"),
            s.method.apply_to("trim invalid border")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Crop"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Output"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Cube"),
        s.path.apply_to(paths.cube.display())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Preview"),
        s.path.apply_to(paths.preview.display())
    );
    if let Some(ref matches) = paths.matches {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Matches"),
            s.path.apply_to(matches.display())
        );
    }
    if let Some(ref colour) = paths.colour {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Colour"),
            s.path.apply_to(colour.display())
        );
    }
    println!();
}

pub fn print_result_summary(
    stats: &RegistrationStats,
    registered: &Registered,
    paths: &OutputPaths,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Keypoints"),
        s.value.apply_to(format!(
            "{} src / {} dst",
            stats.src_keypoints, stats.dst_keypoints
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Matches"),
        s.value.apply_to(format!(
            "{} ({} inliers, {} iterations)",
            stats.matches, stats.inliers, stats.ransac_iterations
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Homography"),
        s.value.apply_to(registered.homography)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Border"),
        s.value.apply_to(format!("{} px trimmed", registered.border_trim))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Cube"),
        s.value.apply_to(format!(
            "{}x{}x{}",
            registered.cube.cols(),
            registered.cube.rows(),
            registered.cube.bands()
        ))
    );
    println!();
    println!(
        "  Output saved to {}",
        s.path.apply_to(paths.cube.display())
    );
}
