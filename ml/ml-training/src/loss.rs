//! Classification loss and accuracy.

use burn::prelude::Backend;
use burn::tensor::activation::log_softmax;
use burn::tensor::{ElementConversion, Int, Tensor};

/// Computes categorical cross-entropy between logits and one-hot targets.
///
/// Softmax is applied internally in log-space, so `logits` must be raw
/// scores rather than probabilities.
///
/// # Arguments
///
/// - `logits`: Predicted scores `[batch, num_classes]`
/// - `targets`: One-hot targets `[batch, num_classes]`
///
/// # Returns
///
/// Mean loss over the batch as a single-element tensor.
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).neg().mean()
}

/// Counts rows whose highest-scoring class matches the one-hot target.
///
/// Ties in `logits` resolve to the lowest class index.
pub fn correct_predictions<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let predicted: Tensor<B, 2, Int> = logits.argmax(1);
    let expected: Tensor<B, 2, Int> = targets.argmax(1);
    let correct: i64 = predicted.equal(expected).int().sum().into_scalar().elem();
    usize::try_from(correct).unwrap_or(0)
}

/// Fraction of rows classified correctly, in `[0, 1]`.
///
/// Returns `0.0` for an empty batch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> f32 {
    let [rows, _] = logits.dims();
    if rows == 0 {
        return 0.0;
    }
    correct_predictions(logits, targets) as f32 / rows as f32
}
