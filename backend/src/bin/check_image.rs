//! Manual check: runs one image through the exported model and prints the result.
//!
//! Usage: `check_image <image-path>`. Model and label paths follow the server's
//! `MODEL_PATH` / `LABELS_PATH` environment.

use backend::config::ServerConfig;
use backend::state::AppState;
use std::env;
use std::error::Error;
use std::fs;

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let image_path = env::args().nth(1).ok_or("usage: check_image <image-path>")?;
    let config = ServerConfig::from_env()?;
    let state = AppState::load(&config);

    let image = fs::read(&image_path)?;
    let prediction = state.predict(&image)?;

    println!("Prediction: {}", prediction.label);
    println!("Confidence: {:.2} %", prediction.confidence * 100.0);
    Ok(())
}
