use super::preprocess::{Letterbox, Preprocessor};
use super::types::{InferenceParams, Mask, SegmentationBackend};
use crate::config::ComputeTarget;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use ndarray::Array2;
use ort::execution_providers::{
    CUDAExecutionProvider, ExecutionProviderDispatch, TensorRTExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Mask coefficients per detection in YOLOv8-seg heads
const MASK_COEFFS: usize = 32;

/// Probability above which a pixel belongs to the instance
const MASK_THRESHOLD: f32 = 0.5;

/// Predictions and mask prototypes
const REQUIRED_OUTPUTS: usize = 2;

/// FastSAM instance segmentation model
///
/// Runs a YOLOv8-seg style ONNX export in "segment everything" mode: every
/// detection that survives confidence filtering and NMS becomes one mask.
pub struct FastSam {
    session: Session,
    target: ComputeTarget,
}

/// One detection in network input coordinates
#[derive(Clone, Debug, PartialEq)]
struct Detection {
    /// x1, y1, x2, y2
    bbox: [f32; 4],
    score: f32,
    coeffs: Vec<f32>,
}

impl FastSam {
    /// Create a new FastSAM model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `target` - Device to run inference on; ONNX Runtime falls back to
    ///   CPU when the requested provider cannot be registered
    pub fn new<P: AsRef<Path>>(model_path: P, target: ComputeTarget) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading FastSAM model from {} on {}", path.display(), target);

        if !path.is_file() {
            bail!("model file {} does not exist", path.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers(execution_providers(target))?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        check_output_count(session.outputs.len())
            .with_context(|| format!("{} is not a segmentation model", path.display()))?;

        tracing::info!("FastSAM model loaded successfully");

        Ok(Self { session, target })
    }
}

fn execution_providers(target: ComputeTarget) -> Vec<ExecutionProviderDispatch> {
    match target {
        ComputeTarget::Cpu => vec![],
        ComputeTarget::Cuda { device_id } => vec![CUDAExecutionProvider::default()
            .with_device_id(device_id)
            .build()],
        ComputeTarget::TensorRt { device_id } => vec![
            TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
        ],
    }
}

impl SegmentationBackend for FastSam {
    fn segment(&mut self, image: &RgbImage, params: &InferenceParams) -> Result<Vec<Mask>> {
        let _span = tracing::debug_span!("fastsam_segment", device = %self.target).entered();

        let size = params.image_size as usize;
        let (input, letterbox) = Preprocessor::new(params.image_size).preprocess(image);
        let input = Tensor::from_array(([1usize, 3, size, size], input.into_raw_vec()))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        // output0: [1, 4 + classes + 32, anchors], output1: [1, 32, mh, mw]
        check_output_count(outputs.len())?;
        let (pred_shape, preds) = outputs[0].try_extract_tensor::<f32>()?;
        let (proto_shape, protos) = outputs[1].try_extract_tensor::<f32>()?;
        let OutputLayout {
            channels,
            anchors,
            proto_h,
            proto_w,
        } = output_layout(&pred_shape[..], &proto_shape[..], preds.len(), protos.len())?;

        let candidates = decode_predictions(preds, channels, anchors, params.conf_threshold);
        let detections = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
        tracing::debug!("FastSAM kept {} detections", detections.len());

        let (width, height) = image.dimensions();
        let protos = Prototypes {
            data: protos,
            width: proto_w,
            height: proto_h,
        };
        let masks = detections
            .iter()
            .map(|det| {
                render_mask(
                    det,
                    &protos,
                    &letterbox,
                    width as usize,
                    height as usize,
                    params.retina_masks,
                )
            })
            .collect();

        Ok(masks)
    }

    fn name(&self) -> &'static str {
        "fastsam"
    }
}

fn check_output_count(count: usize) -> Result<()> {
    if count < REQUIRED_OUTPUTS {
        bail!(
            "model has {} output(s), expected {} (predictions and mask prototypes)",
            count,
            REQUIRED_OUTPUTS
        );
    }
    Ok(())
}

/// Dimensions read from the two output tensors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OutputLayout {
    channels: usize,
    anchors: usize,
    proto_h: usize,
    proto_w: usize,
}

/// Validate output shapes against the buffers before any indexing
fn output_layout(
    pred_shape: &[i64],
    proto_shape: &[i64],
    preds_len: usize,
    protos_len: usize,
) -> Result<OutputLayout> {
    let dim = |d: i64| usize::try_from(d).ok();
    let layout = match (pred_shape, proto_shape) {
        ([_, channels, anchors], [_, coeffs, proto_h, proto_w]) => {
            match (dim(*channels), dim(*anchors), dim(*coeffs), dim(*proto_h), dim(*proto_w)) {
                (Some(channels), Some(anchors), Some(MASK_COEFFS), Some(proto_h), Some(proto_w)) => {
                    Some(OutputLayout {
                        channels,
                        anchors,
                        proto_h,
                        proto_w,
                    })
                }
                _ => None,
            }
        }
        _ => None,
    };

    match layout {
        Some(l)
            if l.channels > 4 + MASK_COEFFS
                && l.proto_h > 0
                && l.proto_w > 0
                && preds_len >= l.channels * l.anchors
                && protos_len >= MASK_COEFFS * l.proto_h * l.proto_w =>
        {
            Ok(l)
        }
        _ => bail!(
            "unexpected output shapes: predictions {:?}, prototypes {:?}",
            pred_shape,
            proto_shape
        ),
    }
}

/// Pick anchors whose best class score reaches `conf_threshold`
///
/// `preds` is channel-major: value of channel `c` for anchor `a` lives at
/// `c * anchors + a`.
fn decode_predictions(
    preds: &[f32],
    channels: usize,
    anchors: usize,
    conf_threshold: f32,
) -> Vec<Detection> {
    let classes = channels - 4 - MASK_COEFFS;
    let at = |c: usize, a: usize| preds[c * anchors + a];

    (0..anchors)
        .filter_map(|a| {
            let score = (0..classes)
                .map(|k| at(4 + k, a))
                .fold(f32::NEG_INFINITY, f32::max);
            if score < conf_threshold {
                return None;
            }
            let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
            let coeffs = (0..MASK_COEFFS).map(|k| at(4 + classes + k, a)).collect();
            Some(Detection {
                bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                score,
                coeffs,
            })
        })
        .collect()
}

/// Greedy NMS; survivors come back in descending score order
fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        if kept
            .iter()
            .all(|k| box_iou(&k.bbox, &candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn box_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = iw * ih;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Prototype masks, shape [32, height, width] flattened
struct Prototypes<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
}

impl Prototypes<'_> {
    /// sigmoid(coeffs . prototypes) at prototype resolution
    fn combine(&self, coeffs: &[f32]) -> Vec<f32> {
        let plane = self.width * self.height;
        let mut logits = vec![0.0f32; plane];
        for (k, &coeff) in coeffs.iter().enumerate() {
            let proto = &self.data[k * plane..(k + 1) * plane];
            for (acc, &p) in logits.iter_mut().zip(proto) {
                *acc += coeff * p;
            }
        }
        logits.into_iter().map(sigmoid).collect()
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Render one detection as a mask at the original image resolution
///
/// Pixels outside the detection box are always false.
fn render_mask(
    det: &Detection,
    protos: &Prototypes<'_>,
    letterbox: &Letterbox,
    width: usize,
    height: usize,
    retina: bool,
) -> Mask {
    let probs = protos.combine(&det.coeffs);
    let mut mask = Array2::from_elem((height, width), false);

    let (x1, y1) = letterbox.to_original(det.bbox[0], det.bbox[1]);
    let (x2, y2) = letterbox.to_original(det.bbox[2], det.bbox[3]);
    let col_start = x1.max(0.0).ceil() as usize;
    let row_start = y1.max(0.0).ceil() as usize;
    let col_end = (x2.max(0.0).ceil() as usize).min(width);
    let row_end = (y2.max(0.0).ceil() as usize).min(height);

    let to_proto_x = protos.width as f32 / letterbox.size as f32;
    let to_proto_y = protos.height as f32 / letterbox.size as f32;

    for row in row_start..row_end {
        for col in col_start..col_end {
            let (ix, iy) = letterbox.to_input(col as f32 + 0.5, row as f32 + 0.5);
            let px = ix * to_proto_x - 0.5;
            let py = iy * to_proto_y - 0.5;
            let p = if retina {
                sample_bilinear(&probs, protos.width, protos.height, px, py)
            } else {
                sample_nearest(&probs, protos.width, protos.height, px, py)
            };
            mask[[row, col]] = p > MASK_THRESHOLD;
        }
    }

    mask
}

fn sample_bilinear(map: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let top = map[y0 * width + x0] * (1.0 - fx) + map[y0 * width + x1] * fx;
    let bottom = map[y1 * width + x0] * (1.0 - fx) + map[y1 * width + x1] * fx;
    top * (1.0 - fy) + bottom * fy
}

fn sample_nearest(map: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x = (x.round().max(0.0) as usize).min(width - 1);
    let y = (y.round().max(0.0) as usize).min(height - 1);
    map[y * width + x]
}
