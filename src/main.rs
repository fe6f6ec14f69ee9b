mod data;
mod model;
mod sample;
mod train;

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::data::{TrainingSet, WINDOW_LEN, WINDOW_STRIDE};
use crate::train::{training_loop, TrainConfig};

/// Train a character-level LSTM on a text corpus, sampling generated text
/// and saving a checkpoint after every epoch.
#[derive(Parser, Debug)]
#[command(name = "char-lstm")]
struct Args {
    /// Dataset to use for training. Recommended size >500KB.
    #[arg(long, default_value = "training_data.txt")]
    data: PathBuf,

    /// Resume from a previously saved checkpoint.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Exponent applied to the predicted distribution before drawing a
    /// character. Must be positive.
    #[arg(long, default_value_t = 0.05)]
    randomness: f32,

    /// Number of epochs to train for.
    #[arg(long, default_value_t = 200)]
    epochs: usize,

    /// Batch size. Reduce this if you run out of memory.
    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    /// Directory where checkpoints are written, created if absent.
    #[arg(long, default_value = "weights")]
    save_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(
        args.randomness > 0.0,
        "randomness must be > 0, got {}",
        args.randomness
    );

    fs::create_dir_all(&args.save_dir)
        .with_context(|| format!("creating save dir {}", args.save_dir.display()))?;

    let text = fs::read_to_string(&args.data)
        .with_context(|| format!("reading corpus from {}", args.data.display()))?;
    println!("corpus length: {}", text.chars().count());

    let ds = TrainingSet::from_text(&text, WINDOW_LEN, WINDOW_STRIDE)?;
    println!("total chars: {}", ds.vocab().len());
    println!("training pairs: {}", ds.num_pairs());

    let cfg = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        randomness: args.randomness,
        save_dir: args.save_dir,
        resume: args.weights,
        ..Default::default()
    };
    training_loop(&ds, &cfg)
}
