//! Trains the hand-sign classifier and exports `model.pt`, `sign_model.ot` and `labels.txt`.
//!
//! Usage: `train [config.yaml]`. Without an argument the config path comes from
//! `TRAIN_CONFIG`, then `config/training.yaml`.

use backend::config::{TrainConfig, DEFAULT_TRAIN_CONFIG};
use backend::training::Trainer;
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("TRAIN_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_TRAIN_CONFIG.to_string());
    log::info!("Loading training config from {}", config_path);

    let config = TrainConfig::load(&config_path)?;
    let history = Trainer::new(config).run()?;

    if let Some(last) = history.last() {
        log::info!(
            "Final epoch {}: accuracy {:.4}, val_accuracy {:.4}",
            last.epoch,
            last.train.accuracy,
            last.validation.accuracy
        );
    }
    Ok(())
}
