//! Separable 2-D DCT-II, row-then-column, matching the formula the moire
//! detector's spec step expects: `X_k = sum_n x_n * cos(pi/N*(n+0.5)*k)`.

pub fn dct2_magnitude(samples: &[f32], width: usize, height: usize) -> Vec<f32> {
    let row_basis = cosine_basis(width);
    let col_basis = cosine_basis(height);

    // Transform rows.
    let mut intermediate = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &samples[y * width..(y + 1) * width];
        for k in 0..width {
            let mut sum = 0.0f32;
            for n in 0..width {
                sum += row[n] * row_basis[k * width + n];
            }
            intermediate[y * width + k] = sum;
        }
    }

    // Transform columns.
    let mut output = vec![0.0f32; width * height];
    for x in 0..width {
        for k in 0..height {
            let mut sum = 0.0f32;
            for n in 0..height {
                sum += intermediate[n * width + x] * col_basis[k * height + n];
            }
            output[k * width + x] = sum.abs();
        }
    }

    output
}

fn cosine_basis(n: usize) -> Vec<f32> {
    let mut basis = vec![0.0f32; n * n];
    for k in 0..n {
        for i in 0..n {
            basis[k * n + i] =
                (std::f32::consts::PI / n as f32 * (i as f32 + 0.5) * k as f32).cos();
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_input_concentrates_energy_in_dc_term() {
        let samples = vec![100.0f32; 16 * 16];
        let spectrum = dct2_magnitude(&samples, 16, 16);
        let dc = spectrum[0];
        let ac_sum: f32 = spectrum.iter().skip(1).sum();
        assert!(dc > ac_sum);
    }

    #[test]
    fn output_length_matches_input() {
        let samples = vec![0.0f32; 8 * 12];
        let spectrum = dct2_magnitude(&samples, 8, 12);
        assert_eq!(spectrum.len(), 8 * 12);
    }
}
