use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encode a batch into `[B, max_len]` id and attention-mask tensors,
/// truncating long inputs and right-padding short ones with `pad_id`.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let mut ids = Vec::with_capacity(texts.len() * max_len);
    let mut mask = Vec::with_capacity(texts.len() * max_len);
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let (row_ids, row_mask) = pad_row(enc.get_ids(), enc.get_attention_mask(), max_len, pad_id);
        ids.extend(row_ids);
        mask.extend(row_mask);
    }
    let input_ids = Tensor::from_iter(ids, device)?.reshape((texts.len(), max_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((texts.len(), max_len))?;
    Ok((input_ids, attention_mask))
}

fn pad_row(ids: &[u32], mask: &[u32], max_len: usize, pad_id: u32) -> (Vec<u32>, Vec<u32>) {
    let mut ids = ids.to_vec();
    let mut mask = mask.to_vec();
    ids.truncate(max_len);
    mask.truncate(max_len);
    ids.resize(max_len, pad_id);
    mask.resize(max_len, 0);
    (ids, mask)
}
