mod image;
mod namespace;
mod resource;
mod topology;

pub use image::{ApplicationImage, NOT_AVAILABLE, is_image_stream_reference};
pub use namespace::NamespaceGraph;
pub use resource::{ApplicationConfig, Kind, Pod, Resource, Workload};
pub use topology::TopologyModel;
