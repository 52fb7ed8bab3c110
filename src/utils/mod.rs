pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{crop_tile, encode_png_async, load_image_async, validate_image_path, SUPPORTED_FORMATS};
pub use metrics::{Metrics, MetricsSnapshot};
