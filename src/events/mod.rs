// Note event module
// Segmentation of a decoded contour into note events

pub mod segment;
pub mod types;

pub use segment::{
    contour_to_events, segment_contour, segment_contour_with_config, SegmentConfig, SegmentError,
};
pub use types::Event;
