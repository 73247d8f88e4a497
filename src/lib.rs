#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod cache;
pub mod cancel;
pub mod capability;
pub mod errors;
pub mod exec;
pub mod frame;
pub mod gpu;
pub mod graph;
pub mod pipeline;
pub mod runner;

pub use cache::cache_key;
pub use cancel::CancelToken;
pub use capability::{
    CapabilityEvents, Segmenter, SegmenterBackend, SegmenterConfig, SegmenterDtype, SrContentType,
    SrKey, SrModel, SuperResolver, install_segmenter, install_super_resolver,
};
pub use errors::{CycleError, ExecError, PipelineError, Result, ValidationIssue};
pub use exec::{DeviceUsed, ExecutionContext, NodeExecutor};
pub use frame::ImageFrame;
pub use gpu::{GpuContext, gpu_device, init_gpu};
pub use graph::{downstream_nodes, topo_sort, upstream_nodes, validate_pipeline};
pub use pipeline::{EdgeDef, NodeDef, NodeKind, ParamValue, Params, PipelineDefinition};
pub use runner::{NodeState, NodeStatus, NullObserver, RunObserver, RunOptions, RunOutput, Runner};
