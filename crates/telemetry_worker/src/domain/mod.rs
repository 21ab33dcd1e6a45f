mod descrambler;
mod error;
mod extractor;
mod frame_decoder;
mod frame_encoder;
mod freshness;
mod integrity;
mod telemetry_pipeline;
mod topic;

pub use descrambler::*;
pub use error::*;
pub use extractor::*;
pub use frame_decoder::*;
pub use frame_encoder::*;
pub use freshness::*;
pub use integrity::*;
pub use telemetry_pipeline::*;
pub use topic::*;
