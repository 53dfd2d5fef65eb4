pub mod config;
pub mod consts;
pub mod crop;
pub mod cube;
pub mod error;
pub mod features;
pub mod filters;
pub mod homography;
pub mod io;
pub mod matching;
pub mod registration;
pub mod validate;
pub mod visualize;
pub mod warp;
