use std::collections::HashMap;

use candle_core::{Device, Result, Tensor};
use rand::Rng;

pub const WINDOW_LEN: usize = 40;
pub const WINDOW_STRIDE: usize = 3;

/// Bidirectional character/index mapping. Indices are assigned in sorted
/// character order, so identical corpora always yield identical vocabularies.
#[derive(Debug)]
pub struct Vocab {
    chars: Vec<char>,
    index: HashMap<char, u32>,
}

impl Vocab {
    pub fn from_text(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        let index = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { chars, index }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn index_of(&self, c: char) -> Option<u32> {
        self.index.get(&c).copied()
    }

    pub fn char_at(&self, idx: u32) -> Option<char> {
        self.chars.get(idx as usize).copied()
    }

    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().filter_map(|c| self.index_of(c)).collect()
    }

    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter().filter_map(|&i| self.char_at(i)).collect()
    }
}

/// The vectorized corpus: every stride-S window of length L paired with the
/// character that follows it. Built once at startup, read-only afterwards.
#[derive(Debug)]
pub struct TrainingSet {
    corpus: Vec<u32>,
    vocab: Vocab,
    window_len: usize,
    stride: usize,
}

impl TrainingSet {
    pub fn from_text(text: &str, window_len: usize, stride: usize) -> anyhow::Result<Self> {
        let vocab = Vocab::from_text(text);
        if vocab.len() < 2 {
            anyhow::bail!(
                "corpus needs at least 2 distinct characters, found {}",
                vocab.len()
            );
        }
        let corpus = vocab.encode(text);
        if corpus.len() <= window_len {
            anyhow::bail!(
                "corpus too short to train on: {} chars, window length is {}",
                corpus.len(),
                window_len
            );
        }
        Ok(Self {
            corpus,
            vocab,
            window_len,
            stride,
        })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Windows start at 0, S, 2S, ... while `start + L < corpus_len`.
    pub fn num_pairs(&self) -> usize {
        (self.corpus.len() - self.window_len - 1) / self.stride + 1
    }

    /// The i-th (window, next-char) pair.
    pub fn pair(&self, i: usize) -> (&[u32], u32) {
        let start = i * self.stride;
        (
            &self.corpus[start..start + self.window_len],
            self.corpus[start + self.window_len],
        )
    }

    /// One-hot encode the given pairs into an input tensor of shape
    /// `(batch, window, vocab)` and a target index tensor of shape `(batch,)`.
    pub fn one_hot_batch(&self, pairs: &[usize], device: &Device) -> Result<(Tensor, Tensor)> {
        let v = self.vocab.len();
        let l = self.window_len;
        let mut xs = vec![0f32; pairs.len() * l * v];
        let mut ys = Vec::with_capacity(pairs.len());
        for (row, &i) in pairs.iter().enumerate() {
            let (window, target) = self.pair(i);
            for (t, &c) in window.iter().enumerate() {
                xs[row * l * v + t * v + c as usize] = 1.0;
            }
            ys.push(target);
        }
        let x = Tensor::from_vec(xs, (pairs.len(), l, v), device)?;
        let y = Tensor::from_vec(ys, (pairs.len(),), device)?;
        Ok((x, y))
    }

    /// Random corpus slice of window length, used to seed a sampling episode.
    pub fn seed_window(&self, rng: &mut impl Rng) -> Vec<u32> {
        let start = rng.gen_range(0..self.corpus.len() - self.window_len);
        self.corpus[start..start + self.window_len].to_vec()
    }
}

/// One-hot encode a single rolling window as a `(1, len, vocab)` tensor.
pub fn one_hot_window(window: &[u32], vocab_size: usize, device: &Device) -> Result<Tensor> {
    let mut xs = vec![0f32; window.len() * vocab_size];
    for (t, &c) in window.iter().enumerate() {
        xs[t * vocab_size + c as usize] = 1.0;
    }
    Tensor::from_vec(xs, (1, window.len(), vocab_size), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn vocab_is_sorted_and_deduplicated() {
        let vocab = Vocab::from_text("aab");
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.index_of('a'), Some(0));
        assert_eq!(vocab.index_of('b'), Some(1));
        assert_eq!(vocab.char_at(0), Some('a'));
        assert_eq!(vocab.char_at(1), Some('b'));
        assert_eq!(vocab.index_of('c'), None);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let text = "hello world";
        let vocab = Vocab::from_text(text);
        assert_eq!(vocab.decode(&vocab.encode(text)), text);
    }

    #[test]
    fn pair_count_matches_sliding_formula() {
        let text: String = ('a'..='z').cycle().take(100).collect();
        let ds = TrainingSet::from_text(&text, 10, 3).unwrap();
        // floor((100 - 10 - 1) / 3) + 1
        assert_eq!(ds.num_pairs(), 30);
        let (window, _) = ds.pair(ds.num_pairs() - 1);
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn pairs_match_corpus_slices() {
        let text = "the quick brown fox jumps over the lazy dog";
        let chars: Vec<char> = text.chars().collect();
        let ds = TrainingSet::from_text(text, 8, 3).unwrap();
        for i in 0..ds.num_pairs() {
            let (window, target) = ds.pair(i);
            let start = i * 3;
            let expected: String = chars[start..start + 8].iter().collect();
            assert_eq!(ds.vocab().decode(window), expected);
            assert_eq!(ds.vocab().char_at(target), Some(chars[start + 8]));
        }
    }

    #[test]
    fn one_hot_argmax_recovers_characters() {
        let text = "abcabcabcabc";
        let ds = TrainingSet::from_text(text, 4, 2).unwrap();
        let idxs: Vec<usize> = (0..ds.num_pairs()).collect();
        let (x, y) = ds.one_hot_batch(&idxs, &Device::Cpu).unwrap();
        assert_eq!(x.dims(), &[idxs.len(), 4, ds.vocab().len()]);
        let rows = x.to_vec3::<f32>().unwrap();
        let targets = y.to_vec1::<u32>().unwrap();
        for (row, &i) in rows.iter().zip(idxs.iter()) {
            let (window, target) = ds.pair(i);
            for (onehot, &expected) in row.iter().zip(window.iter()) {
                let argmax = onehot
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(j, _)| j as u32)
                    .unwrap();
                assert_eq!(argmax, expected);
                let set_bits: f32 = onehot.iter().sum();
                assert_eq!(set_bits, 1.0);
            }
            assert_eq!(targets[i], target);
        }
    }

    #[test]
    fn rejects_corpus_shorter_than_window() {
        let err = TrainingSet::from_text("abc", 40, 3).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn rejects_single_character_vocabulary() {
        let text = "a".repeat(100);
        let err = TrainingSet::from_text(&text, 40, 3).unwrap_err();
        assert!(err.to_string().contains("distinct characters"));
    }

    #[test]
    fn seed_window_is_a_corpus_slice() {
        let text = "the quick brown fox jumps over the lazy dog";
        let ds = TrainingSet::from_text(text, 8, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let seed = ds.seed_window(&mut rng);
            assert_eq!(seed.len(), 8);
            let decoded = ds.vocab().decode(&seed);
            assert!(text.contains(&decoded));
        }
    }
}
