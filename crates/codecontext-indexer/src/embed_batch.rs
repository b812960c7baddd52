//! Embedding coordinator: batched passage embedding with dynamic batch
//! sizing.
//!
//! Accelerator memory scales with batch size × longest sequence, so the
//! batch size shrinks as the longest input grows (chars/4 approximates the
//! token count). Input order is preserved regardless of internal batching,
//! and accelerator caches are released every few batches.

use codecontext_core::constants::EMBED_CLEANUP_INTERVAL;
use codecontext_core::error::EmbeddingError;
use codecontext_core::instruction::InstructionType;
use codecontext_store::embedding::EmbeddingProvider;
use tracing::debug;

pub struct EmbeddingCoordinator {
    provider: Box<dyn EmbeddingProvider>,
    base_batch_size: usize,
    cleanup_interval: usize,
    batches_since_cleanup: usize,
}

impl EmbeddingCoordinator {
    pub fn new(provider: Box<dyn EmbeddingProvider>, base_batch_size: usize) -> Self {
        Self {
            provider,
            base_batch_size: base_batch_size.max(1),
            cleanup_interval: EMBED_CLEANUP_INTERVAL,
            batches_since_cleanup: 0,
        }
    }

    pub fn vector_dim(&self) -> usize {
        self.provider.vector_dim()
    }

    /// Embed passages in order. The effective batch size is derived from the
    /// longest input in the call.
    pub fn embed_passages(
        &mut self,
        texts: &[String],
        instruction: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let longest = texts.iter().map(String::len).max().unwrap_or(0);
        let batch_size = dynamic_batch_size(longest, self.base_batch_size);
        debug!(
            inputs = texts.len(),
            longest_chars = longest,
            batch_size,
            instruction = %instruction,
            "embedding passages"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.provider.embed(batch, instruction)?);
            self.batches_since_cleanup += 1;
            if self.batches_since_cleanup >= self.cleanup_interval {
                self.provider.release_caches();
                self.batches_since_cleanup = 0;
            }
        }

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::ShapeMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }

    /// Memory-barrier hook invoked by the sync engine between chunks.
    pub fn release_caches(&mut self) {
        self.provider.release_caches();
        self.batches_since_cleanup = 0;
    }
}

/// Shrink the batch as the (approximate) token count of the longest input
/// grows: 2.5k tokens → 8, 5k → 4, 10k → 2, 20k+ → 1.
pub fn dynamic_batch_size(longest_chars: usize, base_batch_size: usize) -> usize {
    let approx_tokens = longest_chars / 4;
    let cap = if approx_tokens >= 20_000 {
        1
    } else if approx_tokens >= 10_000 {
        2
    } else if approx_tokens >= 5_000 {
        4
    } else if approx_tokens >= 2_500 {
        8
    } else {
        base_batch_size
    };
    cap.min(base_batch_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthProvider;

    impl EmbeddingProvider for LengthProvider {
        fn model_id(&self) -> &str {
            "length"
        }
        fn vector_dim(&self) -> usize {
            1
        }
        fn embed(
            &mut self,
            texts: &[String],
            _instruction: InstructionType,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn batch_size_shrinks_with_input_length() {
        assert_eq!(dynamic_batch_size(0, 64), 64);
        assert_eq!(dynamic_batch_size(100, 64), 64);
        assert_eq!(dynamic_batch_size(10_000, 64), 8);
        assert_eq!(dynamic_batch_size(20_000, 64), 4);
        assert_eq!(dynamic_batch_size(40_000, 64), 2);
        assert_eq!(dynamic_batch_size(80_000, 64), 1);
    }

    #[test]
    fn batch_size_respects_base_limit() {
        assert_eq!(dynamic_batch_size(100, 4), 4);
        assert_eq!(dynamic_batch_size(10_000, 4), 4);
    }

    #[test]
    fn output_preserves_input_order() {
        let mut coordinator = EmbeddingCoordinator::new(Box::new(LengthProvider), 2);
        let texts = vec!["aaa".to_string(), "a".to_string(), "aa".to_string()];
        let vectors = coordinator
            .embed_passages(&texts, InstructionType::Nl2CodePassage)
            .unwrap();
        assert_eq!(vectors, vec![vec![3.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn empty_input_embeds_nothing() {
        let mut coordinator = EmbeddingCoordinator::new(Box::new(LengthProvider), 8);
        let vectors = coordinator
            .embed_passages(&[], InstructionType::QaQuery)
            .unwrap();
        assert!(vectors.is_empty());
    }
}
