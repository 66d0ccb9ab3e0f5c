//! Activation helpers over flat row-major buffers.

/// ReLU applied in place.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Zero the gradient wherever the ReLU output was not positive.
pub fn relu_backward_inplace(activations: &[f32], grad: &mut [f32]) {
    for (g, &a) in grad.iter_mut().zip(activations.iter()) {
        if a <= 0.0 {
            *g = 0.0;
        }
    }
}

/// Row-wise softmax with max subtraction for numerical stability.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols) {
        let max_value = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0usize;
    for (i, &value) in row.iter().enumerate().skip(1) {
        if value > row[best] {
            best = i;
        }
    }
    best
}
