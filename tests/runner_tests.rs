//! Scheduler End-to-End Tests
//!
//! Runs full pipelines against deterministic stub capabilities. Tests for:
//! - single-node contain fit and PNG encoding
//! - warm-cache re-runs (all nodes cached, bit-identical blob)
//! - parameter edits invalidating only the downstream subgraph
//! - cooperative cancellation before and during a run
//! - per-node failure policy (run continues, downstream starves)
//! - structural rejection (cycles, missing nodes)

use std::sync::Mutex;

use image::{GrayImage, Luma, Rgba, RgbaImage};

use pipemagic::capability::{
    CapabilityEvents, Segmenter, SegmenterConfig, SrKey, SuperResolver, install_segmenter,
    install_super_resolver,
};
use pipemagic::errors::CapabilityError;
use pipemagic::{
    CancelToken, EdgeDef, ImageFrame, NodeDef, NodeKind, NodeStatus, PipelineDefinition,
    PipelineError, RunObserver, RunOptions, Runner,
};

// Capability slots are process-wide; serialize the tests that touch them.
static CAPABILITY_LOCK: Mutex<()> = Mutex::new(());

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

// ============================================================================
// Stub capabilities
// ============================================================================

/// Marks every non-white pixel as foreground.
struct ThresholdSegmenter;

impl Segmenter for ThresholdSegmenter {
    fn prepare(
        &mut self,
        _config: SegmenterConfig,
        events: &dyn CapabilityEvents,
    ) -> Result<(), CapabilityError> {
        events.download_progress(Some(0.5));
        events.download_progress(None);
        Ok(())
    }

    fn segment(
        &mut self,
        bitmap: &RgbaImage,
        _threshold: f32,
    ) -> Result<GrayImage, CapabilityError> {
        Ok(GrayImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
            let p = bitmap.get_pixel(x, y);
            if p.0[0] > 250 && p.0[1] > 250 && p.0[2] > 250 {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }
}

/// Always fails, for exercising the per-node error policy.
struct FailingSegmenter;

impl Segmenter for FailingSegmenter {
    fn prepare(
        &mut self,
        _config: SegmenterConfig,
        _events: &dyn CapabilityEvents,
    ) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn segment(
        &mut self,
        _bitmap: &RgbaImage,
        _threshold: f32,
    ) -> Result<GrayImage, CapabilityError> {
        Err(CapabilityError("boom".to_string()))
    }
}

/// Requests cancellation from inside its own inference, emulating a user
/// pressing "stop" while a model runs.
struct AbortingSegmenter {
    token: CancelToken,
}

impl Segmenter for AbortingSegmenter {
    fn prepare(
        &mut self,
        _config: SegmenterConfig,
        _events: &dyn CapabilityEvents,
    ) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn segment(
        &mut self,
        bitmap: &RgbaImage,
        _threshold: f32,
    ) -> Result<GrayImage, CapabilityError> {
        self.token.cancel();
        Ok(GrayImage::from_pixel(bitmap.width(), bitmap.height(), Luma([255])))
    }
}

/// Nearest-neighbor 2× stand-in for the learned upscaler.
struct NearestUpscaler;

impl SuperResolver for NearestUpscaler {
    fn prepare(&mut self, _key: SrKey, _events: &dyn CapabilityEvents) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn render(&mut self, bitmap: &RgbaImage) -> Result<RgbaImage, CapabilityError> {
        Ok(RgbaImage::from_fn(
            bitmap.width() * 2,
            bitmap.height() * 2,
            |x, y| *bitmap.get_pixel(x / 2, y / 2),
        ))
    }

    fn requires_gpu(&self) -> bool {
        false
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Records every status transition for later assertions.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, NodeStatus)>>,
}

impl RunObserver for Recorder {
    fn node_status(&self, node_id: &str, status: NodeStatus, _error: Option<&str>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((node_id.to_string(), status));
    }
}

impl Recorder {
    fn last_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|(id, _)| id == node_id)
            .map(|(_, s)| *s)
    }

    fn is_empty(&self) -> bool {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

fn edge(id: &str, source: &str, target: &str) -> EdgeDef {
    EdgeDef::new(id, source, target)
}

/// input → remove-bg → normalize → outline → upscale → output.
fn sticker_pipeline(outline_thickness: f64) -> PipelineDefinition {
    PipelineDefinition::new(
        vec![
            NodeDef::new("input", NodeKind::Input),
            NodeDef::new("remove-bg", NodeKind::RemoveBg),
            NodeDef::new("normalize", NodeKind::Normalize)
                .with_param("size", 64.0)
                .with_param("padding", 8.0),
            NodeDef::new("outline", NodeKind::Outline)
                .with_param("thickness", outline_thickness)
                .with_param("color", "#00ff00")
                .with_param("opacity", 1.0)
                .with_param("position", "outside"),
            NodeDef::new("upscale", NodeKind::Upscale),
            NodeDef::new("output", NodeKind::Output).with_param("format", "png"),
        ],
        vec![
            edge("e1", "input", "remove-bg"),
            edge("e2", "remove-bg", "normalize"),
            edge("e3", "normalize", "outline"),
            edge("e4", "outline", "upscale"),
            edge("e5", "upscale", "output"),
        ],
    )
}

/// White background with a red square: the stub segmenter keeps the square.
fn sticker_source() -> ImageFrame {
    ImageFrame::new(RgbaImage::from_fn(64, 64, |x, y| {
        if (16..48).contains(&x) && (16..48).contains(&y) {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    }))
}

fn install_stubs() {
    let _ = env_logger::builder().is_test(true).try_init();
    install_segmenter(Box::new(ThresholdSegmenter));
    install_super_resolver(Box::new(NearestUpscaler));
}

// ============================================================================
// Single node
// ============================================================================

#[test]
fn single_node_pipeline_resizes_with_contain_fit() {
    let pipeline = PipelineDefinition::new(
        vec![
            NodeDef::new("input", NodeKind::Input)
                .with_param("maxSize", 512.0)
                .with_param("fit", "contain"),
            NodeDef::new("output", NodeKind::Output).with_param("format", "png"),
        ],
        vec![edge("e1", "input", "output")],
    );
    let source = ImageFrame::new(RgbaImage::from_pixel(1024, 512, Rgba([9, 9, 9, 255])));

    let mut runner = Runner::new();
    let out = runner
        .run(&pipeline, &source, None, &RunOptions::default())
        .unwrap();

    assert_eq!((out.width, out.height), (512, 256));
    assert_eq!(&out.blob[..4], &PNG_MAGIC);
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn warm_rerun_serves_every_node_from_cache() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    install_stubs();

    let pipeline = sticker_pipeline(4.0);
    let source = sticker_source();
    let mut runner = Runner::new();

    let first = runner
        .run(&pipeline, &source, None, &RunOptions::default())
        .unwrap();

    let recorder = Recorder::default();
    let options = RunOptions {
        signal: None,
        observer: Some(&recorder),
    };
    let second = runner.run(&pipeline, &source, None, &options).unwrap();

    for id in ["input", "remove-bg", "normalize", "outline", "upscale", "output"] {
        assert_eq!(
            recorder.last_status(id),
            Some(NodeStatus::Cached),
            "{id} should warm-hit"
        );
    }
    assert_eq!(first.blob, second.blob, "warm blob must be bit-identical");
}

#[test]
fn new_source_revision_invalidates_every_node() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    install_stubs();

    let pipeline = sticker_pipeline(4.0);
    let mut runner = Runner::new();
    runner
        .run(&pipeline, &sticker_source(), None, &RunOptions::default())
        .unwrap();

    // Same pixels, fresh frame: the revision bump must cascade.
    let recorder = Recorder::default();
    let options = RunOptions {
        signal: None,
        observer: Some(&recorder),
    };
    runner
        .run(&pipeline, &sticker_source(), None, &options)
        .unwrap();

    for id in ["input", "remove-bg", "normalize", "outline", "upscale", "output"] {
        assert_eq!(recorder.last_status(id), Some(NodeStatus::Done));
    }
}

#[test]
fn param_edit_invalidates_only_downstream_nodes() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    install_stubs();

    let source = sticker_source();
    let mut runner = Runner::new();
    runner
        .run(&sticker_pipeline(4.0), &source, None, &RunOptions::default())
        .unwrap();

    let recorder = Recorder::default();
    let options = RunOptions {
        signal: None,
        observer: Some(&recorder),
    };
    runner
        .run(&sticker_pipeline(8.0), &source, None, &options)
        .unwrap();

    for id in ["input", "remove-bg", "normalize"] {
        assert_eq!(
            recorder.last_status(id),
            Some(NodeStatus::Cached),
            "{id} is upstream of the edit and should stay cached"
        );
    }
    for id in ["outline", "upscale", "output"] {
        assert_eq!(
            recorder.last_status(id),
            Some(NodeStatus::Done),
            "{id} must recompute after the thickness edit"
        );
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn abort_before_start_fires_no_callbacks() {
    let pipeline = PipelineDefinition::new(
        vec![
            NodeDef::new("input", NodeKind::Input),
            NodeDef::new("output", NodeKind::Output),
        ],
        vec![edge("e1", "input", "output")],
    );
    let source = ImageFrame::new(RgbaImage::new(4, 4));

    let token = CancelToken::new();
    token.cancel();
    let recorder = Recorder::default();
    let options = RunOptions {
        signal: Some(&token),
        observer: Some(&recorder),
    };

    let err = Runner::new().run(&pipeline, &source, None, &options).unwrap_err();
    assert!(matches!(err, PipelineError::Aborted));
    assert!(recorder.is_empty());
}

#[test]
fn mid_run_abort_leaves_no_node_running() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let token = CancelToken::new();
    install_segmenter(Box::new(AbortingSegmenter {
        token: token.clone(),
    }));
    install_super_resolver(Box::new(NearestUpscaler));

    let pipeline = sticker_pipeline(4.0);
    let source = sticker_source();
    let mut runner = Runner::new();
    let options = RunOptions {
        signal: Some(&token),
        observer: None,
    };

    let err = runner.run(&pipeline, &source, None, &options).unwrap_err();
    assert!(matches!(err, PipelineError::Aborted));

    for node in &pipeline.nodes {
        let status = runner.node_state(&node.id).unwrap().status;
        assert_ne!(status, NodeStatus::Running, "{} left running", node.id);
    }
    assert_eq!(runner.node_state("input").unwrap().status, NodeStatus::Done);
    assert_eq!(runner.node_state("remove-bg").unwrap().status, NodeStatus::Idle);
    assert_eq!(runner.node_state("outline").unwrap().status, NodeStatus::Pending);
}

// ============================================================================
// Failure policy
// ============================================================================

#[test]
fn failing_node_starves_downstream_and_run_reports_empty_output() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    install_segmenter(Box::new(FailingSegmenter));
    install_super_resolver(Box::new(NearestUpscaler));

    let pipeline = sticker_pipeline(4.0);
    let mut runner = Runner::new();
    let err = runner
        .run(&pipeline, &sticker_source(), None, &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyOutput));

    let removed = runner.node_state("remove-bg").unwrap();
    assert_eq!(removed.status, NodeStatus::Error);
    assert_eq!(removed.error.as_deref(), Some("boom"));

    // Downstream nodes fail on their own with the canonical starvation error.
    let starved = runner.node_state("normalize").unwrap();
    assert_eq!(starved.status, NodeStatus::Error);
    assert_eq!(starved.error.as_deref(), Some("No input image"));
}

// ============================================================================
// Structural rejection
// ============================================================================

#[test]
fn cyclic_pipeline_is_rejected_with_validation_error() {
    let pipeline = PipelineDefinition::new(
        vec![
            NodeDef::new("input", NodeKind::Input),
            NodeDef::new("a", NodeKind::Normalize),
            NodeDef::new("b", NodeKind::Outline),
            NodeDef::new("output", NodeKind::Output),
        ],
        vec![
            edge("e1", "input", "a"),
            edge("e2", "a", "b"),
            edge("e3", "b", "a"),
            edge("e4", "b", "output"),
        ],
    );
    let source = ImageFrame::new(RgbaImage::new(4, 4));

    let err = Runner::new()
        .run(&pipeline, &source, None, &RunOptions::default())
        .unwrap_err();
    let PipelineError::Validation(issues) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert!(issues.iter().any(|i| i.message.contains("contains a cycle")));
}

#[test]
fn pipeline_without_input_node_is_rejected() {
    let pipeline = PipelineDefinition::new(
        vec![NodeDef::new("output", NodeKind::Output)],
        vec![],
    );
    let source = ImageFrame::new(RgbaImage::new(4, 4));

    let err = Runner::new()
        .run(&pipeline, &source, None, &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

// ============================================================================
// Editor-driven invalidation
// ============================================================================

#[test]
fn invalidate_clears_node_and_downstream_cache() {
    let _guard = CAPABILITY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    install_stubs();

    let pipeline = sticker_pipeline(4.0);
    let source = sticker_source();
    let mut runner = Runner::new();
    runner
        .run(&pipeline, &source, None, &RunOptions::default())
        .unwrap();

    runner.invalidate("normalize", &pipeline.edges);

    assert!(runner.node_output("normalize").is_none());
    assert!(runner.node_output("outline").is_none());
    assert!(runner.node_output("upscale").is_none());
    // Upstream of the edit keeps its memo.
    assert!(runner.node_output("remove-bg").is_some());
}
