//! Playback pipeline graph.
//!
//! A pipeline is an ordered chain of stages that hand one staging buffer
//! down the line:
//!
//! ```text
//! AppSource → AudioConverter → … → PcmSink
//! ```
//!
//! - **Caps**: each stage advertises what it accepts and produces; adjacent
//!   stages must intersect when linked
//! - **Nodes**: stages implement [`Node`] and rewrite the buffer in place
//! - **Executor**: [`Pipeline`] runs the stages sequentially on one thread

mod app_source;
mod caps;
mod converter;
mod executor;
mod node;

pub use app_source::AppSource;
pub use caps::AudioCaps;
pub use converter::AudioConverter;
pub use executor::{Pipeline, PipelineBuilder};
pub use node::Node;
