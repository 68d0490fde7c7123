use std::borrow::Cow;
use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::{CHANNELS, INPUT_SIZE};
use super::InferenceError;

/// Turns one preprocessed batch into a class-probability vector.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript artifact exported by the trainer.
pub struct Model {
    module: Mutex<CModule>,
    device: Device,
    num_classes: usize,
}

impl Model {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let mut module = CModule::load_on_device(path, device)?;
        module.set_eval();

        // Warm-up pass: sizes the runtime buffers and checks the input contract.
        let side = INPUT_SIZE as i64;
        let warmup = Tensor::zeros([1, side, side, CHANNELS as i64], (Kind::Float, device));
        let output = tch::no_grad(|| module.forward_ts(&[warmup]))?;
        let num_classes = output.numel();
        if num_classes == 0 {
            return Err(InferenceError::EmptyOutput);
        }

        Ok(Self {
            module: Mutex::new(module),
            device,
            num_classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl Classifier for Model {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let (n, h, w, c) = input.dim();
        let values = match input.as_slice() {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(input.iter().copied().collect::<Vec<_>>()),
        };
        let tensor = Tensor::from_slice(&*values)
            .reshape([n as i64, h as i64, w as i64, c as i64])
            .to_device(self.device);

        let output = {
            let module = self.module.lock().map_err(|_| InferenceError::Poisoned)?;
            tch::no_grad(|| module.forward_ts(&[tensor]))?
        };
        let flat = output.to_kind(Kind::Float).to_device(Device::Cpu).reshape([-1]);
        let probabilities = Vec::<f32>::try_from(&flat)?;
        if probabilities.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }
        Ok(probabilities)
    }
}
