pub mod metadata;
pub mod preview;

pub use metadata::RunMetadata;
pub use preview::write_preview;
