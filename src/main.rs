use std::path::PathBuf;

use anyhow::Context;
use log::info;

use gd_quadratic::descent::{self, DescentConfig};
use gd_quadratic::vis;

const FIGURE_DIR: &str = "figures";
const FIGURE_NAME: &str = "gd_torch_quadratic_diagnostics.png";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = DescentConfig::default();
    info!(
        "running {} steps from x0={} with lr={}",
        config.steps, config.x0, config.learning_rate
    );
    let run = descent::run(&config).context("gradient descent failed")?;

    let out_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(FIGURE_DIR)
        .join(FIGURE_NAME);
    vis::save_loss_plot(&run.history, &out_path)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    let out_path = out_path.canonicalize().unwrap_or(out_path);
    println!("Saved {}", out_path.display());
    Ok(())
}
