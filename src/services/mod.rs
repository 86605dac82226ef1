//! File services used by the request pipeline

pub mod io;
pub mod tempfiles;

pub use io::ImageIOService;
pub use tempfiles::{TempFileService, TempFileStream};
