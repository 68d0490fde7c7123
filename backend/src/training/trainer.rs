use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::nn::{self, ModuleT, OptimizerConfig};
use tch::{CModule, Device, Kind, Tensor};

use super::network::layer_summary;
use super::{Augmenter, ImageFolder, SignNet, TrainError};
use crate::config::{OutputConfig, TrainConfig};
use crate::inference::{LabelSet, CHANNELS, INPUT_SIZE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train: EpochMetrics,
    pub validation: EpochMetrics,
}

#[derive(Default)]
struct MetricTotals {
    loss: f64,
    correct: f64,
    seen: usize,
}

impl MetricTotals {
    fn add(&mut self, logits: &Tensor, labels: &Tensor, loss: &Tensor) {
        let count = labels.size()[0] as usize;
        self.loss += loss.double_value(&[]) * count as f64;
        self.correct += logits.accuracy_for_logits(labels).double_value(&[]) * count as f64;
        self.seen += count;
    }

    fn finish(self) -> EpochMetrics {
        if self.seen == 0 {
            return EpochMetrics { loss: 0.0, accuracy: 0.0 };
        }
        EpochMetrics {
            loss: self.loss / self.seen as f64,
            accuracy: self.correct / self.seen as f64,
        }
    }
}

pub struct Trainer {
    config: TrainConfig,
    device: Device,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            device: Device::cuda_if_available(),
        }
    }

    /// Fits the network, then writes the checkpoint, the TorchScript artifact
    /// and the label list.
    pub fn run(&self) -> Result<Vec<EpochSummary>, TrainError> {
        let train_set = ImageFolder::open(self.config.train_dir())?;
        let validation_set =
            ImageFolder::open_with_classes(self.config.validation_dir(), train_set.classes())?;
        info!(
            "Found {} training images belonging to {} classes in {}",
            train_set.len(),
            train_set.classes().len(),
            train_set.root().display()
        );
        info!(
            "Found {} validation images in {}",
            validation_set.len(),
            validation_set.root().display()
        );

        let mut rng = match self.config.training.seed {
            Some(seed) => {
                tch::manual_seed(seed as i64);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_os_rng(),
        };

        let side = INPUT_SIZE as i64;
        let num_classes = train_set.classes().len() as i64;
        let vs = nn::VarStore::new(self.device);
        let net = SignNet::new(&vs.root(), side, num_classes, self.config.training.dropout);
        log_summary(&vs, side, num_classes);

        let mut opt = nn::Adam::default().build(&vs, self.config.training.learning_rate)?;
        let augmenter = Augmenter::new(self.config.augmentation.clone());

        let epochs = self.config.training.epochs;
        let mut history = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            let started = Instant::now();
            let train = self.train_epoch(&net, &mut opt, &train_set, &augmenter, &mut rng)?;
            let validation = self.evaluate(&net, &validation_set)?;
            info!(
                "Epoch {}/{} - {:.1}s - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4}",
                epoch,
                epochs,
                started.elapsed().as_secs_f64(),
                train.loss,
                train.accuracy,
                validation.loss,
                validation.accuracy
            );
            history.push(EpochSummary { epoch, train, validation });
        }

        export_artifacts(&vs, &net, train_set.classes(), &self.config.output)?;
        info!("Training complete!");
        Ok(history)
    }

    fn train_epoch(
        &self,
        net: &SignNet,
        opt: &mut nn::Optimizer,
        dataset: &ImageFolder,
        augmenter: &Augmenter,
        rng: &mut StdRng,
    ) -> Result<EpochMetrics, TrainError> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(rng);

        let mut totals = MetricTotals::default();
        for batch in order.chunks(self.config.training.batch_size.max(1)) {
            let (images, labels) = dataset.load_batch(batch, INPUT_SIZE)?;
            let images = augmenter.apply(&images.to_device(self.device), rng);
            let labels = labels.to_device(self.device);

            let logits = net.forward_t(&images, true);
            let loss = logits.cross_entropy_for_logits(&labels);
            opt.backward_step(&loss);
            totals.add(&logits, &labels, &loss);
        }
        Ok(totals.finish())
    }

    fn evaluate(&self, net: &SignNet, dataset: &ImageFolder) -> Result<EpochMetrics, TrainError> {
        tch::no_grad(|| {
            let order: Vec<usize> = (0..dataset.len()).collect();
            let mut totals = MetricTotals::default();
            for batch in order.chunks(self.config.training.batch_size.max(1)) {
                let (images, labels) = dataset.load_batch(batch, INPUT_SIZE)?;
                let labels = labels.to_device(self.device);
                let logits = net.forward_t(&images.to_device(self.device), false);
                let loss = logits.cross_entropy_for_logits(&labels);
                totals.add(&logits, &labels, &loss);
            }
            Ok(totals.finish())
        })
    }
}

fn log_summary(vs: &nn::VarStore, image_size: i64, num_classes: i64) {
    info!("Model summary (output shapes per image):");
    for (layer, shape) in layer_summary(image_size, num_classes) {
        info!("  {:<8} {:?}", layer, shape);
    }
    let params: usize = vs.trainable_variables().iter().map(Tensor::numel).sum();
    info!("Trainable params: {}", params);
}

/// Writes the full-precision checkpoint, the traced inference artifact
/// (NHWC float input, softmax output) and the label list.
pub fn export_artifacts(
    vs: &nn::VarStore,
    net: &SignNet,
    classes: &[String],
    output: &OutputConfig,
) -> Result<(), TrainError> {
    for path in [&output.full_model, &output.mobile_model, &output.labels] {
        ensure_parent(path)?;
    }

    vs.save(&output.full_model)?;
    info!("Full model saved as {}", output.full_model.display());

    let side = INPUT_SIZE as i64;
    let example = Tensor::zeros([1, side, side, CHANNELS as i64], (Kind::Float, vs.device()));
    let mut forward = |inputs: &[Tensor]| vec![net.probabilities(&inputs[0])];
    let module = tch::no_grad(|| {
        CModule::create_by_tracing("SignNet", "forward", &[example], &mut forward)
    })?;
    module.save(&output.mobile_model)?;
    info!("Inference model saved as {}", output.mobile_model.display());

    LabelSet::new(classes.to_vec()).write(&output.labels)?;
    info!("Labels saved as {}", output.labels.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AugmentationConfig, DatasetConfig, ServerConfig, TrainingConfig, DEFAULT_MAX_UPLOAD_BYTES,
    };
    use crate::inference::{Classifier, Model};
    use crate::state::AppState;
    use crate::test_support::png_bytes;
    use image::{DynamicImage, Rgb, RgbImage};
    use ndarray::Array4;

    fn output_in(dir: &Path) -> OutputConfig {
        OutputConfig {
            full_model: dir.join("out/sign_model.ot"),
            mobile_model: dir.join("out/model.pt"),
            labels: dir.join("out/labels.txt"),
        }
    }

    #[test]
    fn metric_totals_average_over_samples() {
        let logits = Tensor::from_slice(&[2.0f32, 0.0, 0.0, 2.0, 2.0, 0.0]).reshape([3, 2]);
        let labels = Tensor::from_slice(&[0i64, 1, 1]);
        let loss = Tensor::from(0.5f32);
        let mut totals = MetricTotals::default();
        totals.add(&logits, &labels, &loss);
        let metrics = totals.finish();
        assert!((metrics.loss - 0.5).abs() < 1e-9);
        assert!((metrics.accuracy - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(MetricTotals::default().finish().accuracy, 0.0);
    }

    #[test]
    fn exported_artifact_loads_for_inference() {
        let dir = tempfile::tempdir().unwrap();
        let output = output_in(dir.path());
        let classes = vec!["A".to_string(), "B".to_string()];

        let vs = nn::VarStore::new(Device::Cpu);
        let net = SignNet::new(&vs.root(), INPUT_SIZE as i64, 2, 0.5);
        export_artifacts(&vs, &net, &classes, &output).unwrap();

        let model = Model::load(&output.mobile_model).unwrap();
        assert_eq!(model.num_classes(), 2);

        let input = Array4::<f32>::from_elem((1, 224, 224, 3), 0.5);
        let probabilities = model.classify(&input).unwrap();
        assert_eq!(probabilities.len(), 2);
        assert!((probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let expected = net.probabilities(&Tensor::full([1, 224, 224, 3], 0.5, (Kind::Float, Device::Cpu)));
        let expected = Vec::<f32>::try_from(&expected.reshape([-1])).unwrap();
        for (a, e) in probabilities.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-5);
        }

        assert_eq!(LabelSet::load(&output.labels).unwrap().names(), classes.as_slice());

        let mut restored = nn::VarStore::new(Device::Cpu);
        let _ = SignNet::new(&restored.root(), INPUT_SIZE as i64, 2, 0.5);
        restored.load(&output.full_model).unwrap();
    }

    #[test]
    fn repeated_invocations_do_not_leak_state() {
        let dir = tempfile::tempdir().unwrap();
        let output = output_in(dir.path());
        let classes = vec!["A".to_string(), "B".to_string()];

        tch::manual_seed(7);
        let vs = nn::VarStore::new(Device::Cpu);
        let net = SignNet::new(&vs.root(), INPUT_SIZE as i64, 2, 0.5);
        export_artifacts(&vs, &net, &classes, &output).unwrap();
        let model = Model::load(&output.mobile_model).unwrap();

        let x = Array4::<f32>::from_elem((1, 224, 224, 3), 0.5);
        let y = Array4::<f32>::from_shape_fn((1, 224, 224, 3), |(_, h, w, c)| {
            ((h * 3 + w * 5 + c * 7) % 256) as f32 / 255.0
        });

        let first = model.classify(&x).unwrap();
        let second = model.classify(&y).unwrap();
        let third = model.classify(&x).unwrap();

        assert_eq!(first, third);
        assert_ne!(first, second);
    }

    #[test]
    fn short_run_produces_servable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dataset");
        for (split, count) in [("training", 3), ("validation", 1)] {
            for (class, color) in [("A", [255, 0, 0]), ("B", [0, 0, 255])] {
                let class_dir = root.join(split).join(class);
                fs::create_dir_all(&class_dir).unwrap();
                for i in 0..count {
                    RgbImage::from_pixel(40, 30, Rgb(color))
                        .save(class_dir.join(format!("{class}_{i}.png")))
                        .unwrap();
                }
            }
        }

        let config = TrainConfig {
            dataset: DatasetConfig {
                root: root.clone(),
                ..DatasetConfig::default()
            },
            training: TrainingConfig {
                batch_size: 4,
                epochs: 1,
                seed: Some(0),
                ..TrainingConfig::default()
            },
            augmentation: AugmentationConfig::default(),
            output: output_in(dir.path()),
        };
        let history = Trainer::new(config.clone()).run().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].epoch, 1);
        assert!((0.0..=1.0).contains(&history[0].train.accuracy));
        assert!((0.0..=1.0).contains(&history[0].validation.accuracy));

        let state = AppState::load(&ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: config.output.mobile_model.clone(),
            labels_path: config.output.labels.clone(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        });
        assert!(state.is_model_loaded());
        assert_eq!(state.labels().names(), ["A", "B"]);

        let upload = png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([255, 0, 0]))));
        let prediction = state.predict(&upload).unwrap();
        assert!(["A", "B"].contains(&prediction.label.as_str()));
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }
}
