use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array3;

use crate::cube::Cube;
use crate::error::{HyperspecError, Result};

pub const CUBE_HEADER_SIZE: usize = 64;
pub const CUBE_MAGIC: &[u8; 8] = b"HSPECUBE";
pub const CUBE_VERSION: u32 = 1;

/// Header of a raw `.hsc` cube container (64 bytes, little-endian).
///
/// Layout: magic (8), version, rows, cols, bands, wavelength count (u32
/// each), zero padding. The header is followed by the wavelengths as f32 and
/// then `rows * cols * bands` f32 samples, band-interleaved by pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CubeHeader {
    pub version: u32,
    pub rows: u32,
    pub cols: u32,
    pub bands: u32,
    pub wavelength_count: u32,
}

impl CubeHeader {
    pub fn for_cube(cube: &Cube) -> Self {
        Self {
            version: CUBE_VERSION,
            rows: cube.rows() as u32,
            cols: cube.cols() as u32,
            bands: cube.bands() as u32,
            wavelength_count: cube.wavelengths.len() as u32,
        }
    }

    pub fn sample_count(&self) -> Result<usize> {
        (self.rows as usize)
            .checked_mul(self.cols as usize)
            .and_then(|n| n.checked_mul(self.bands as usize))
            .ok_or_else(|| HyperspecError::InvalidCube("cube dimensions overflow".into()))
    }

    /// Total file size implied by the header.
    pub fn file_size(&self) -> Result<usize> {
        let floats = self
            .sample_count()?
            .checked_add(self.wavelength_count as usize)
            .ok_or_else(|| HyperspecError::InvalidCube("cube dimensions overflow".into()))?;
        floats
            .checked_mul(4)
            .and_then(|n| n.checked_add(CUBE_HEADER_SIZE))
            .ok_or_else(|| HyperspecError::InvalidCube("cube dimensions overflow".into()))
    }

    fn validate(&self) -> Result<()> {
        if self.version != CUBE_VERSION {
            return Err(HyperspecError::InvalidCube(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.wavelength_count != 0 && self.wavelength_count != self.bands {
            return Err(HyperspecError::InvalidCube(format!(
                "{} wavelengths for {} bands",
                self.wavelength_count, self.bands
            )));
        }
        Ok(())
    }
}

fn parse_header(mut buf: &[u8]) -> Result<CubeHeader> {
    let mut magic = [0u8; 8];
    buf.read_exact(&mut magic)?;
    if &magic != CUBE_MAGIC {
        return Err(HyperspecError::InvalidCube("missing HSPECUBE magic".into()));
    }
    let header = CubeHeader {
        version: buf.read_u32::<LittleEndian>()?,
        rows: buf.read_u32::<LittleEndian>()?,
        cols: buf.read_u32::<LittleEndian>()?,
        bands: buf.read_u32::<LittleEndian>()?,
        wavelength_count: buf.read_u32::<LittleEndian>()?,
    };
    header.validate()?;
    Ok(header)
}

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> HyperspecError {
    move |e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            HyperspecError::InvalidCube(format!("file too small for {what}"))
        }
        _ => e.into(),
    }
}

fn read_header_from(file: &mut impl Read) -> Result<CubeHeader> {
    let mut buf = [0u8; CUBE_HEADER_SIZE];
    file.read_exact(&mut buf).map_err(truncated("cube header"))?;
    parse_header(&buf)
}

/// Read only the header of a cube file.
pub fn read_header(path: &Path) -> Result<CubeHeader> {
    read_header_from(&mut File::open(path)?)
}

/// Read the header and the wavelength table, leaving the samples untouched.
pub fn read_wavelengths(path: &Path) -> Result<(CubeHeader, Vec<f32>)> {
    let mut file = File::open(path)?;
    let header = read_header_from(&mut file)?;
    let mut wavelengths = vec![0.0f32; header.wavelength_count as usize];
    file.read_f32_into::<LittleEndian>(&mut wavelengths)
        .map_err(truncated("wavelength table"))?;
    Ok((header, wavelengths))
}

/// Read a cube file through a memory map.
pub fn read_cube(path: &Path) -> Result<Cube> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() < CUBE_HEADER_SIZE {
        return Err(HyperspecError::InvalidCube(
            "file too small for cube header".into(),
        ));
    }
    let header = parse_header(&mmap[..CUBE_HEADER_SIZE])?;

    let expected = header.file_size()?;
    if mmap.len() < expected {
        return Err(HyperspecError::InvalidCube(format!(
            "file truncated: expected {} bytes, got {}",
            expected,
            mmap.len()
        )));
    }

    let wl_end = CUBE_HEADER_SIZE + header.wavelength_count as usize * 4;
    let mut wavelengths = vec![0.0f32; header.wavelength_count as usize];
    LittleEndian::read_f32_into(&mmap[CUBE_HEADER_SIZE..wl_end], &mut wavelengths);

    let mut samples = vec![0.0f32; header.sample_count()?];
    LittleEndian::read_f32_into(&mmap[wl_end..expected], &mut samples);

    let shape = (
        header.rows as usize,
        header.cols as usize,
        header.bands as usize,
    );
    let data = Array3::from_shape_vec(shape, samples)
        .map_err(|e| HyperspecError::InvalidCube(e.to_string()))?;
    Cube::new(data, wavelengths)
}

/// Write `cube` as a `.hsc` container.
pub fn write_cube(path: &Path, cube: &Cube) -> Result<()> {
    let header = CubeHeader::for_cube(cube);
    let mut w = BufWriter::new(File::create(path)?);

    w.write_all(CUBE_MAGIC)?;
    w.write_u32::<LittleEndian>(header.version)?;
    w.write_u32::<LittleEndian>(header.rows)?;
    w.write_u32::<LittleEndian>(header.cols)?;
    w.write_u32::<LittleEndian>(header.bands)?;
    w.write_u32::<LittleEndian>(header.wavelength_count)?;
    w.write_all(&[0u8; CUBE_HEADER_SIZE - 28])?;

    for &wl in &cube.wavelengths {
        w.write_f32::<LittleEndian>(wl)?;
    }
    // Logical iteration order is (row, col, band) for any memory layout.
    for &v in cube.data.iter() {
        w.write_f32::<LittleEndian>(v)?;
    }
    w.flush()?;
    Ok(())
}
