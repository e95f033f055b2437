#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{ExtractorError, PoseBackend};
use crate::detect::result::{decode_single_pose, PoseEstimate};
use crate::frame::Frame;

/// Tract-based backend for single-pose ONNX models.
///
/// Expects an NHWC float input `[1, H, W, 3]` with RGB values in 0..255 and a
/// `[1, 1, 17, 3]` output of normalized `(y, x, score)` triples.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor, ExtractorError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ExtractorError::InvalidFrame(format!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let pixels = frame.pixels();
        let width = frame.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, frame.height as usize, width, 3),
            |(_, y, x, channel)| pixels[(y * width + x) * 3 + channel] as f32,
        );

        Ok(input.into_tensor())
    }
}

impl PoseBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<PoseEstimate, ExtractorError> {
        let input = self.build_input(frame)?;
        let started = Instant::now();
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| ExtractorError::Inference(format!("ONNX inference failed: {e}")))?;
        let inference = started.elapsed();

        let output = outputs
            .first()
            .ok_or_else(|| ExtractorError::MalformedOutput("model produced no outputs".into()))?;
        let values = output
            .to_array_view::<f32>()
            .map_err(|e| ExtractorError::MalformedOutput(format!("output not f32: {e}")))?;
        let flat: Vec<f32> = values.iter().copied().collect();
        let pose = decode_single_pose(&flat, frame.width, frame.height)?;

        Ok(PoseEstimate {
            poses: vec![pose],
            inference,
        })
    }
}
