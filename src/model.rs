use candle_core::{Result, Tensor, D};
use candle_nn::{
    linear, loss::cross_entropy, lstm, ops, Linear, Module, VarBuilder, LSTM, LSTMConfig, RNN,
};

use crate::sample::CharPredictor;

pub struct NetConfig {
    pub vocab_size: usize,
    pub hidden_dim: usize,
}

impl NetConfig {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            hidden_dim: 128,
        }
    }
}

/// Two stacked LSTM layers feeding a dense projection down to vocabulary
/// logits. The first layer runs over the full window, the second contributes
/// only its final hidden state.
pub struct CharLstm {
    lstm1: LSTM,
    lstm2: LSTM,
    dense: Linear,
}

impl CharLstm {
    pub fn new(cfg: &NetConfig, vb: VarBuilder) -> Result<Self> {
        let lstm1 = lstm(
            cfg.vocab_size,
            cfg.hidden_dim,
            LSTMConfig::default(),
            vb.pp("lstm1"),
        )?;
        let lstm2 = lstm(
            cfg.hidden_dim,
            cfg.hidden_dim,
            LSTMConfig::default(),
            vb.pp("lstm2"),
        )?;
        let dense = linear(cfg.hidden_dim, cfg.vocab_size, vb.pp("dense"))?;
        Ok(Self {
            lstm1,
            lstm2,
            dense,
        })
    }

    /// `x` is a `(batch, window, vocab)` one-hot tensor; returns
    /// `(batch, vocab)` logits for the next character.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let states = self.lstm1.seq(x)?;
        let hs: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
        let hidden = Tensor::stack(&hs, 1)?;
        let states = self.lstm2.seq(&hidden)?;
        let last = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("empty input window".to_string()))?;
        self.dense.forward(last.h())
    }

    pub fn loss(&self, x: &Tensor, targets: &Tensor) -> Result<Tensor> {
        cross_entropy(&self.forward(x)?, targets)
    }
}

impl CharPredictor for CharLstm {
    fn predict(&self, window: &Tensor) -> Result<Vec<f32>> {
        let logits = self.forward(window)?;
        let probs = ops::softmax(&logits, D::Minus1)?;
        probs.squeeze(0)?.to_vec1::<f32>()
    }
}
