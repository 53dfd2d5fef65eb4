use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use hyperspec_core::io::read_wavelengths;

#[derive(Args)]
pub struct InfoArgs {
    /// Input cube file (.hsc)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let (header, wavelengths) = read_wavelengths(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    println!("File:         {}", args.file.display());
    println!("Version:      {}", header.version);
    println!("Dimensions:   {}x{}", header.cols, header.rows);
    println!("Bands:        {}", header.bands);

    match (wavelengths.first(), wavelengths.last()) {
        (Some(first), Some(last)) => println!("Wavelengths:  {first:.1} - {last:.1} nm"),
        _ => println!("Wavelengths:  unknown"),
    }

    let total_mb = (header.file_size()?) as f64 / (1024.0 * 1024.0);
    println!("Data size:    {:.1} MB", total_mb);

    Ok(())
}
