// Tue Jan 13 2026 - Alex

pub mod address;
pub mod binary;
pub mod error;
pub mod image;
pub mod protection;
pub mod range;
pub mod segment;
pub mod traits;

pub use address::{Address, PointerWidth};
pub use binary::{BinaryImage, ImageFormat, ImageInfo};
pub use error::MemoryError;
pub use image::ImageDatabase;
pub use protection::Protection;
pub use range::MemoryRange;
pub use segment::{Segment, SegmentKind};
pub use traits::{AddressSpace, AnnotationSink, Database, ItemKind};
