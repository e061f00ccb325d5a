//! Neural background removal.
//!
//! A segmentation model maps a fixed-resolution RGB tensor to a per-pixel
//! foreground probability map; the map becomes a soft alpha mask that is
//! composited source-in with the original image. The inference engine sits
//! behind [`SegmentationBackend`] so tests run against a mock and the real
//! ONNX Runtime session stays behind the `onnx` cargo feature.

#[cfg(feature = "onnx")]
use std::sync::Arc;

use futures::StreamExt as _;
use ndarray::{Array4, ArrayView4};

use crate::{
    error::{LaminaError, LaminaResult},
    surface::{Bitmap, mul_div255},
};

/// Fixed model input resolution (square).
pub const MODEL_INPUT_SIZE: u32 = 320;
/// Probability at which the soft mask crosses half opacity.
pub const MASK_THRESHOLD: f32 = 0.3;
/// Width of the linear ramp around [`MASK_THRESHOLD`].
pub const MASK_BAND: f32 = 0.3;

/// One segmentation inference pass: NCHW float32 in, NCHW float32 out, with
/// the probability map in channel 0.
pub trait SegmentationBackend: Send + Sync {
    fn input_size(&self) -> u32 {
        MODEL_INPUT_SIZE
    }

    fn predict(&self, input: ArrayView4<'_, f32>) -> LaminaResult<Array4<f32>>;
}

/// Closure-driven backend for tests and offline use.
pub struct MockBackend {
    predict: Box<dyn Fn(ArrayView4<'_, f32>) -> Array4<f32> + Send + Sync>,
}

impl MockBackend {
    /// Backend answering a constant probability everywhere.
    pub fn constant(probability: f32) -> Self {
        Self::from_fn(move |input| {
            let (n, _c, h, w) = input.dim();
            Array4::from_elem((n, 1, h, w), probability)
        })
    }

    pub fn from_fn(
        predict: impl Fn(ArrayView4<'_, f32>) -> Array4<f32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            predict: Box::new(predict),
        }
    }
}

impl SegmentationBackend for MockBackend {
    fn predict(&self, input: ArrayView4<'_, f32>) -> LaminaResult<Array4<f32>> {
        Ok((self.predict)(input))
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OrtBackend;

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;

    /// ONNX Runtime session over downloaded model weights.
    pub struct OrtBackend {
        session: std::sync::Mutex<ort::session::Session>,
    }

    impl OrtBackend {
        pub fn from_model_bytes(bytes: &[u8]) -> LaminaResult<Self> {
            let session = ort::session::Session::builder()
                .and_then(|builder| builder.commit_from_memory(bytes))
                .map_err(|err| LaminaError::model(format!("build session: {err}")))?;
            Ok(Self {
                session: std::sync::Mutex::new(session),
            })
        }
    }

    impl SegmentationBackend for OrtBackend {
        fn predict(&self, input: ArrayView4<'_, f32>) -> LaminaResult<Array4<f32>> {
            let tensor = ort::value::Tensor::from_array(input.to_owned())
                .map_err(|err| LaminaError::inference(format!("build input tensor: {err}")))?;
            let mut session = self.session.lock().expect("ort session lock");
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|err| LaminaError::inference(format!("run session: {err}")))?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|err| LaminaError::inference(format!("extract output: {err}")))?;
            let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
            let [n, c, h, w] = dims.as_slice() else {
                return Err(LaminaError::inference(format!(
                    "expected 4-d output, got shape {dims:?}"
                )));
            };
            Array4::from_shape_vec((*n, *c, *h, *w), data.to_vec())
                .map_err(|err| LaminaError::inference(format!("reshape output: {err}")))
        }
    }
}

/// Model lifecycle as observed by the editing UI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadProgress {
    Unloaded,
    /// Download in flight, fraction of content-length received.
    Downloading(f32),
    /// Bytes received; native session construction in progress
    /// (indeterminate).
    Building,
    Ready,
}

/// Stream the model weights, reporting bytes-received over content-length.
/// A failed download propagates; nothing partial is kept.
pub async fn fetch_model_bytes(
    url: &str,
    on_progress: &mut dyn FnMut(LoadProgress),
) -> LaminaResult<Vec<u8>> {
    let response = reqwest::get(url)
        .await
        .map_err(|err| LaminaError::model(format!("fetch model '{url}': {err}")))?;
    if !response.status().is_success() {
        return Err(LaminaError::model(format!(
            "fetch model '{url}': HTTP {}",
            response.status()
        )));
    }
    let total = response.content_length().unwrap_or(1).max(1);

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| LaminaError::model(format!("model download: {err}")))?;
        bytes.extend_from_slice(&chunk);
        on_progress(LoadProgress::Downloading(
            bytes.len() as f32 / total as f32,
        ));
    }
    on_progress(LoadProgress::Building);
    Ok(bytes)
}

#[cfg(feature = "onnx")]
static SESSION: tokio::sync::OnceCell<Arc<dyn SegmentationBackend>> =
    tokio::sync::OnceCell::const_new();

/// Download the model and build the inference session, at most once per
/// process. Concurrent callers share one load; a failed load caches nothing,
/// so a later call retries from scratch. The session is never released.
#[cfg(feature = "onnx")]
pub async fn load_model(
    url: &str,
    mut on_progress: impl FnMut(LoadProgress),
) -> LaminaResult<Arc<dyn SegmentationBackend>> {
    let backend = SESSION
        .get_or_try_init(|| async {
            let bytes = fetch_model_bytes(url, &mut on_progress).await?;
            let backend = OrtBackend::from_model_bytes(&bytes)?;
            Ok::<_, LaminaError>(Arc::new(backend) as Arc<dyn SegmentationBackend>)
        })
        .await?
        .clone();
    on_progress(LoadProgress::Ready);
    Ok(backend)
}

/// Map a foreground probability to mask alpha: a linear ramp of width `band`
/// centered on `threshold`, clamped to 0 below and 255 above.
pub fn soft_threshold_alpha(probability: f32, threshold: f32, band: f32) -> u8 {
    let lower = threshold - band * 0.5;
    (((probability - lower) / band).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Remove the background of `source`, returning a new bitmap of the same
/// dimensions with masked-out pixels fully transparent.
///
/// Inference errors propagate untouched; user-facing messaging is the
/// caller's concern.
#[tracing::instrument(skip_all, fields(width = source.width, height = source.height))]
pub fn remove_background(
    backend: &dyn SegmentationBackend,
    source: &Bitmap,
) -> LaminaResult<Bitmap> {
    let side = backend.input_size();
    let straight = source.to_rgba_image();
    let resized = image::imageops::resize(
        &straight,
        side,
        side,
        image::imageops::FilterType::Triangle,
    );

    // NCHW float32, each channel value divided by 255, no mean/std.
    let mut input = Array4::<f32>::zeros((1, 3, side as usize, side as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = f32::from(pixel.0[c]) / 255.0;
        }
    }

    let output = backend.predict(input.view())?;
    let (_, channels, oh, ow) = output.dim();
    if channels == 0 || oh == 0 || ow == 0 {
        return Err(LaminaError::inference(format!(
            "degenerate output shape {:?}",
            output.dim()
        )));
    }

    let mut mask = image::GrayImage::new(ow as u32, oh as u32);
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        let p = output[[0, 0, y as usize, x as usize]];
        pixel.0[0] = soft_threshold_alpha(p, MASK_THRESHOLD, MASK_BAND);
    }
    let mask = image::imageops::resize(
        &mask,
        source.width,
        source.height,
        image::imageops::FilterType::Nearest,
    );

    // source-in: the original survives only under mask alpha.
    let mut out = straight;
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let mask_a = u16::from(mask.get_pixel(x, y).0[0]);
        pixel.0[3] = mul_div255(u16::from(pixel.0[3]), mask_a);
    }
    Ok(Bitmap::from_rgba_image(&out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_is_mid_band_at_threshold() {
        assert_eq!(
            soft_threshold_alpha(MASK_THRESHOLD, MASK_THRESHOLD, MASK_BAND),
            128
        );
    }

    #[test]
    fn alpha_clamps_outside_the_band() {
        let half = MASK_BAND * 0.5;
        assert_eq!(
            soft_threshold_alpha(MASK_THRESHOLD - half, MASK_THRESHOLD, MASK_BAND),
            0
        );
        assert_eq!(
            soft_threshold_alpha(MASK_THRESHOLD - half - 0.1, MASK_THRESHOLD, MASK_BAND),
            0
        );
        assert_eq!(
            soft_threshold_alpha(MASK_THRESHOLD + half, MASK_THRESHOLD, MASK_BAND),
            255
        );
        assert_eq!(soft_threshold_alpha(1.0, MASK_THRESHOLD, MASK_BAND), 255);
    }

    #[test]
    fn alpha_ramps_linearly_in_band() {
        let quarter = MASK_THRESHOLD + MASK_BAND * 0.25;
        assert_eq!(soft_threshold_alpha(quarter, MASK_THRESHOLD, MASK_BAND), 191);
    }
}
