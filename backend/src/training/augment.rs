use rand::Rng;
use tch::{Kind, Tensor};

use crate::config::AugmentationConfig;

// grid_sampler modes
const BILINEAR: i64 = 0;
const BORDER: i64 = 1;

/// One random affine transform, in the normalized [-1, 1] coordinates used by
/// `affine_grid_generator`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParams {
    pub rotation_deg: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    pub shear_deg: f32,
    pub zoom_x: f32,
    pub zoom_y: f32,
    pub flip: bool,
}

impl AffineParams {
    pub const IDENTITY: Self = Self {
        rotation_deg: 0.0,
        shift_x: 0.0,
        shift_y: 0.0,
        shear_deg: 0.0,
        zoom_x: 1.0,
        zoom_y: 1.0,
        flip: false,
    };

    pub fn sample<R: Rng + ?Sized>(config: &AugmentationConfig, rng: &mut R) -> Self {
        let mut symmetric = |range: f32| rng.random_range(-range.abs()..=range.abs());
        let rotation_deg = symmetric(config.rotation_range);
        let shift_x = symmetric(config.width_shift_range);
        let shift_y = symmetric(config.height_shift_range);
        let shear_deg = symmetric(config.shear_range);
        let zoom = config.zoom_range.abs();
        Self {
            rotation_deg,
            shift_x,
            shift_y,
            shear_deg,
            zoom_x: rng.random_range(1.0 - zoom..=1.0 + zoom),
            zoom_y: rng.random_range(1.0 - zoom..=1.0 + zoom),
            flip: config.horizontal_flip && rng.random_bool(0.5),
        }
    }

    /// Row-major 2×3 sampling matrix: rotation · shear · zoom, then shift.
    pub fn theta(&self) -> [f32; 6] {
        let rotation = self.rotation_deg.to_radians();
        let shear = self.shear_deg.to_radians();
        let (sin_r, cos_r) = rotation.sin_cos();
        let (sin_rs, cos_rs) = (rotation + shear).sin_cos();

        let mut m00 = cos_r * self.zoom_x;
        let m01 = -sin_rs * self.zoom_y;
        let mut m10 = sin_r * self.zoom_x;
        let m11 = cos_rs * self.zoom_y;
        if self.flip {
            m00 = -m00;
            m10 = -m10;
        }

        // Normalized coordinates span 2 units per image side.
        [m00, m01, 2.0 * self.shift_x, m10, m11, 2.0 * self.shift_y]
    }
}

pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Applies an independent random transform to every image of an NHWC batch.
    pub fn apply<R: Rng + ?Sized>(&self, images: &Tensor, rng: &mut R) -> Tensor {
        let batch = images.size()[0] as usize;
        let params: Vec<AffineParams> = (0..batch)
            .map(|_| AffineParams::sample(&self.config, rng))
            .collect();
        warp(images, &params)
    }
}

/// Resamples an NHWC batch through one affine transform per image.
pub fn warp(images: &Tensor, params: &[AffineParams]) -> Tensor {
    let nchw = images.permute([0, 3, 1, 2]).contiguous();
    let size = nchw.size();
    let thetas: Vec<f32> = params.iter().flat_map(|p| p.theta()).collect();
    let theta = Tensor::from_slice(&thetas)
        .reshape([params.len() as i64, 2, 3])
        .to_kind(Kind::Float)
        .to_device(images.device());

    let grid = Tensor::affine_grid_generator(&theta, size.as_slice(), false);
    nchw.grid_sampler(&grid, BILINEAR, BORDER, false)
        .permute([0, 2, 3, 1])
        .contiguous()
}
