pub mod cube_io;
pub mod image_io;

pub use cube_io::{read_cube, read_header, read_wavelengths, write_cube, CubeHeader};
pub use image_io::{load_preview, save_preview_png, save_rgb_png};
