//! Manifold Core - multi-threaded MIMO real-time audio processing
//!
//! A host (JACK client, plug-in wrapper, offline driver, …) calls
//! [`RtProcessor::process`] once per block on its real-time thread. Each
//! cycle applies pending structural commands, runs the input list, the
//! middle pass and the output list across the worker pool, and captures
//! pending queries. A non-realtime control thread reshapes the graph at
//! any time through the [`Engine`] without the audio thread ever taking a
//! lock or touching the allocator.
//!
//! # Architecture
//!
//! - **Command queue** ([`queue`]): bounded SPSC rings carrying two-phase
//!   commands; `execute` on the audio thread, `cleanup` (and every
//!   deallocation) on the control thread.
//! - **Processing lists** ([`rtlist`]): owning intrusive lists, mutated
//!   only by commands, iterated as a stable snapshot within a cycle.
//! - **Worker pool** ([`Engine`] parameter `threads`): `position % N`
//!   slicing with a semaphore barrier per stage.
//! - **Combining kernels** ([`combine`]): reduce many sources into one
//!   block by plain accumulation, transform, interpolation or one-block
//!   crossfade, zero-filling only when nothing contributed.
//!
//! # Example
//!
//! ```no_run
//! use manifold_core::{combine_copy, Engine, ParameterMap, Selection};
//! # use manifold_core::{HostPolicy, RtProcessor, SinkPort, SourcePort};
//! # struct MyHost;
//! # impl HostPolicy<f32> for MyHost {
//! #     fn activate(&mut self, _rt: RtProcessor) -> Result<(), RtProcessor> { Ok(()) }
//! #     fn deactivate(&mut self) -> Option<RtProcessor> { None }
//! #     fn make_source(&mut self, _: &ParameterMap) -> Result<Box<dyn SourcePort<f32>>, String> {
//! #         Ok(Box::new(|b: &mut [f32]| b.fill(0.0)))
//! #     }
//! #     fn make_sink(&mut self, _: &ParameterMap) -> Result<Box<dyn SinkPort<f32>>, String> {
//! #         Ok(Box::new(|_: &[f32]| {}))
//! #     }
//! # }
//!
//! let params = ParameterMap::new()
//!     .with("block_size", 256usize)
//!     .with("sample_rate", 48000usize)
//!     .with("threads", 4usize);
//! let mut engine = Engine::new(MyHost, params)?;
//!
//! let a = engine.add_input(&ParameterMap::new())?;
//! let b = engine.add_input(&ParameterMap::new())?;
//!
//! let sources = vec![a.source(), b.source()];
//! engine.add_output(&ParameterMap::new(), move |block: &mut [f32]| {
//!     combine_copy(sources.iter(), block, |_| Selection::Take);
//! })?;
//!
//! engine.activate();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod block;
pub mod combine;
pub mod engine;
pub mod error;
pub mod fade;
pub mod host;
pub mod item;
pub mod params;
pub mod query;
pub mod queue;
pub mod rt;
pub mod rtlist;
pub mod thread_priority;
pub mod types;

mod workers;

pub use block::{write_or_mix, write_or_mix_indexed, write_or_mix_with, SourceBlock, SourceRef};
pub use combine::{
    combine_copy, combine_interpolate, combine_transform, CombineCrossfade, CombineRule,
    CombineSource, CrossfadeSource, Selection,
};
pub use engine::{Engine, Handle, InputHandle, ItemHandle, OutputHandle};
pub use error::{ConfigError, EngineError, ItemError, ItemResult};
pub use fade::CrossfadeWindow;
pub use host::{HostPolicy, SinkPort, SourcePort};
pub use item::{BoxedItem, Input, Item, Output, ProcessItem, Render};
pub use params::{EngineConfig, ParameterMap, Value, DEFAULT_FIFO_SIZE, DEFAULT_THREADS};
pub use query::Query;
pub use queue::{Command, EngineLists, QueueState};
pub use rt::RtProcessor;
pub use rtlist::RtList;
pub use types::{BlockParameter, ItemId, ListId, Sample};
