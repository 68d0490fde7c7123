use tch::nn::{self, ModuleT};
use tch::{Kind, Tensor};

use crate::inference::CHANNELS;

pub const CONV_WIDTHS: [i64; 3] = [32, 64, 128];
pub const HIDDEN_UNITS: i64 = 128;
const KERNEL: i64 = 3;
const POOL: i64 = 2;

/// Spatial side after one unpadded 3×3 convolution and a 2×2 pool.
fn block_side(side: i64) -> i64 {
    (side - (KERNEL - 1)) / POOL
}

pub fn flattened_features(image_size: i64) -> i64 {
    let side = CONV_WIDTHS.iter().fold(image_size, |side, _| block_side(side));
    side * side * CONV_WIDTHS[CONV_WIDTHS.len() - 1]
}

/// Output shape of every layer for a single NHWC image.
pub fn layer_summary(image_size: i64, num_classes: i64) -> Vec<(String, Vec<i64>)> {
    let mut layers = Vec::new();
    let mut side = image_size;
    for (i, width) in CONV_WIDTHS.iter().enumerate() {
        side -= KERNEL - 1;
        layers.push((format!("conv{}", i + 1), vec![side, side, *width]));
        side /= POOL;
        layers.push((format!("pool{}", i + 1), vec![side, side, *width]));
    }
    layers.push(("flatten".to_string(), vec![flattened_features(image_size)]));
    layers.push(("dense".to_string(), vec![HIDDEN_UNITS]));
    layers.push(("dropout".to_string(), vec![HIDDEN_UNITS]));
    layers.push(("output".to_string(), vec![num_classes]));
    layers
}

/// Three conv/pool blocks, a dense layer with dropout, and a linear head.
/// Takes NHWC input in [0, 1] and returns logits.
#[derive(Debug)]
pub struct SignNet {
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    conv3: nn::Conv2D,
    fc1: nn::Linear,
    fc2: nn::Linear,
    dropout: f64,
}

impl SignNet {
    pub fn new(vs: &nn::Path, image_size: i64, num_classes: i64, dropout: f64) -> Self {
        let [w1, w2, w3] = CONV_WIDTHS;
        Self {
            conv1: nn::conv2d(vs / "conv1", CHANNELS as i64, w1, KERNEL, Default::default()),
            conv2: nn::conv2d(vs / "conv2", w1, w2, KERNEL, Default::default()),
            conv3: nn::conv2d(vs / "conv3", w2, w3, KERNEL, Default::default()),
            fc1: nn::linear(vs / "fc1", flattened_features(image_size), HIDDEN_UNITS, Default::default()),
            fc2: nn::linear(vs / "fc2", HIDDEN_UNITS, num_classes, Default::default()),
            dropout,
        }
    }

    /// Evaluation-mode forward pass followed by softmax.
    pub fn probabilities(&self, xs: &Tensor) -> Tensor {
        self.forward_t(xs, false).softmax(-1, Kind::Float)
    }
}

impl ModuleT for SignNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.permute([0, 3, 1, 2])
            .apply(&self.conv1)
            .relu()
            .max_pool2d_default(POOL)
            .apply(&self.conv2)
            .relu()
            .max_pool2d_default(POOL)
            .apply(&self.conv3)
            .relu()
            .max_pool2d_default(POOL)
            .flatten(1, -1)
            .apply(&self.fc1)
            .relu()
            .dropout(self.dropout, train)
            .apply(&self.fc2)
    }
}
