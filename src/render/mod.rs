pub mod normalize;
pub mod tile;

pub use normalize::ToneNormalizer;
pub use tile::{TileRasterizer, compose_rgba, png_file_name, tile_file_name};
