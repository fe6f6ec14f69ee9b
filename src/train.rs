use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use candle_core::{DType, Device};
use candle_nn::{AdamW, Optimizer, VarBuilder, VarMap};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;

use crate::data::TrainingSet;
use crate::model::{CharLstm, NetConfig};
use crate::sample::{sample_text, SampleParams};

pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub randomness: f32,
    pub generate_length: usize,
    pub save_dir: PathBuf,
    pub resume: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            batch_size: 128,
            learning_rate: 1e-3,
            randomness: 0.05,
            generate_length: 400,
            save_dir: PathBuf::from("weights"),
            resume: None,
        }
    }
}

/// Drives the whole run: fit one epoch, then sample from the current model
/// state and write a checkpoint, repeating for the configured epoch count.
pub fn training_loop(ds: &TrainingSet, cfg: &TrainConfig) -> anyhow::Result<()> {
    let dev = Device::cuda_if_available(0)?;

    let mut varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
    let model = CharLstm::new(&NetConfig::new(ds.vocab().len()), vs)?;

    if let Some(path) = &cfg.resume {
        varmap
            .load(path)
            .with_context(|| format!("loading weights from {}", path.display()))?;
    }

    let mut optim = AdamW::new_lr(varmap.all_vars(), cfg.learning_rate)?;
    let mut rng = rand::thread_rng();
    let mut order: Vec<usize> = (0..ds.num_pairs()).collect();

    for epoch in 0..cfg.epochs {
        order.shuffle(&mut rng);
        let loss = fit_one_epoch(&model, ds, &mut optim, &order, cfg.batch_size, &dev)?;
        println!("Epoch {}/{} - loss: {:.4}", epoch + 1, cfg.epochs, loss);
        sample_and_save(&model, &varmap, ds, cfg, epoch, &dev, &mut rng)?;
    }

    Ok(())
}

fn fit_one_epoch(
    model: &CharLstm,
    ds: &TrainingSet,
    optim: &mut AdamW,
    order: &[usize],
    batch_size: usize,
    dev: &Device,
) -> anyhow::Result<f32> {
    let mut total = 0f32;
    let mut batches = 0usize;
    for chunk in order.chunks(batch_size) {
        let (x, y) = ds.one_hot_batch(chunk, dev)?;
        let loss = model.loss(&x, &y)?;
        optim.backward_step(&loss)?;
        total += loss.to_vec0::<f32>()?;
        batches += 1;
    }
    Ok(total / batches.max(1) as f32)
}

fn sample_and_save(
    model: &CharLstm,
    varmap: &VarMap,
    ds: &TrainingSet,
    cfg: &TrainConfig,
    epoch: usize,
    dev: &Device,
    rng: &mut ThreadRng,
) -> anyhow::Result<()> {
    let path = cfg
        .save_dir
        .join(format!("trained_model_weights_{epoch}.safetensors"));
    varmap
        .save(&path)
        .with_context(|| format!("saving checkpoint to {}", path.display()))?;
    println!("Saved model.");

    println!();
    println!("----- Generating text after Epoch: {epoch} -----");
    let seed = ds.seed_window(rng);
    println!(
        "----- Generating with seed: \"{}\" -----",
        ds.vocab().decode(&seed).replace('\n', "\\n")
    );
    println!();

    let params = SampleParams {
        randomness: cfg.randomness,
        steps: cfg.generate_length,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    sample_text(model, ds.vocab(), &seed, &params, dev, rng, &mut out)?;
    out.flush()?;
    Ok(())
}
