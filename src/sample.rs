use std::io::Write;

use candle_core::{Device, Tensor};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::data::{one_hot_window, Vocab};

/// Next-character interface the sampler consumes. `predict` returns the
/// distribution over the vocabulary for a one-hot encoded window,
/// non-negative and summing to one.
pub trait CharPredictor {
    fn predict(&self, window: &Tensor) -> candle_core::Result<Vec<f32>>;
}

pub struct SampleParams {
    /// Exponent applied to the predicted distribution before drawing.
    /// Values above 1 sharpen toward the argmax, values below 1 flatten
    /// toward uniform. Must be positive.
    pub randomness: f32,
    pub steps: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            randomness: 0.05,
            steps: 400,
        }
    }
}

/// Extend `seed` by `params.steps` characters, streaming each one to `out`
/// as it is drawn. Returns the full text (seed included), so the output
/// length is always `seed.len() + params.steps`.
pub fn sample_text<M: CharPredictor, R: Rng, W: Write>(
    model: &M,
    vocab: &Vocab,
    seed: &[u32],
    params: &SampleParams,
    device: &Device,
    rng: &mut R,
    out: &mut W,
) -> anyhow::Result<String> {
    anyhow::ensure!(
        params.randomness > 0.0,
        "randomness must be > 0, got {}",
        params.randomness
    );
    anyhow::ensure!(!seed.is_empty(), "seed window is empty");

    out.write_all(vocab.decode(seed).as_bytes())?;
    out.flush()?;

    let mut window = seed.to_vec();
    let mut generated = seed.to_vec();
    for _ in 0..params.steps {
        let x = one_hot_window(&window, vocab.len(), device)?;
        let probs = model.predict(&x)?;
        let next = draw(&probs, params.randomness, rng);
        generated.push(next);
        window.remove(0);
        window.push(next);
        if let Some(c) = vocab.char_at(next) {
            write!(out, "{c}")?;
            out.flush()?;
        }
    }
    writeln!(out)?;
    Ok(vocab.decode(&generated))
}

/// Sharpen with `p^randomness` (zero stays zero), renormalize and draw one
/// index. A distribution that degenerates under the transform (all zero, or
/// non-finite) falls back to a uniform draw over the vocabulary.
fn draw<R: Rng>(probs: &[f32], randomness: f32, rng: &mut R) -> u32 {
    let sharpened: Vec<f32> = probs
        .iter()
        .map(|&p| if p > 0.0 { p.powf(randomness) } else { 0.0 })
        .collect();
    let sum: f32 = sharpened.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        if let Ok(dist) = WeightedIndex::new(&sharpened) {
            return dist.sample(rng) as u32;
        }
    }
    rng.gen_range(0..probs.len()) as u32
}
