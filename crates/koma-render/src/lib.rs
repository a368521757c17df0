pub mod decode;
pub mod export;
pub mod hit;
pub mod paint;
pub mod raster;
pub mod shapes;
pub mod text;

pub use decode::{DecodeError, ImageResolver, SourceCache};
pub use export::{ExportError, ExportOptions, MAX_EXPORT_SIDE, encode_png, export_page, export_png};
pub use hit::{Hit, hit_test};
pub use paint::{PaintStats, paint_page};
pub use raster::Raster;
pub use text::load_font;
