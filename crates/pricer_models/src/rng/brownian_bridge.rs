//! Brownian-bridge construction of path increments.
//!
//! The first input variate fixes the terminal value of the Brownian path, the
//! second its midpoint, and so on by bisection. Low-discrepancy sequences put
//! their best-distributed coordinates into the first inputs, so the bridge
//! concentrates them on the coarse shape of each path.

/// Bridge over a fixed time grid.
///
/// [`transform`](Self::transform) maps `n` independent standard normals to
/// `n` standardised increments `(W(t_i) - W(t_{i-1})) / sqrt(t_i - t_{i-1})`,
/// which are again independent standard normals.
#[derive(Debug, Clone)]
pub struct BrownianBridge {
    sqrt_dt: Vec<f64>,
    bridge_index: Vec<usize>,
    left_index: Vec<usize>,
    right_index: Vec<usize>,
    left_weight: Vec<f64>,
    right_weight: Vec<f64>,
    std_dev: Vec<f64>,
}

impl BrownianBridge {
    /// Bridge over `n` unit-spaced steps.
    pub fn new(n: usize) -> Self {
        let times: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        Self::with_times(&times)
    }

    /// Bridge over strictly increasing positive `times`.
    pub fn with_times(times: &[f64]) -> Self {
        let n = times.len();
        let mut bridge = Self {
            sqrt_dt: Vec::with_capacity(n),
            bridge_index: vec![0; n],
            left_index: vec![0; n],
            right_index: vec![0; n],
            left_weight: vec![0.0; n],
            right_weight: vec![0.0; n],
            std_dev: vec![0.0; n],
        };
        if n == 0 {
            return bridge;
        }

        let mut prev = 0.0;
        for &t in times {
            bridge.sqrt_dt.push((t - prev).sqrt());
            prev = t;
        }

        let mut placed = vec![false; n];
        placed[n - 1] = true;
        bridge.bridge_index[0] = n - 1;
        bridge.std_dev[0] = times[n - 1].sqrt();

        let mut j = 0;
        for i in 1..n {
            if let Some(open) = (j..n).chain(0..j).find(|&p| !placed[p]) {
                j = open;
            }
            let mut k = j;
            while !placed[k] {
                k += 1;
            }
            // j..k-1 is the first gap; bisect it
            let l = j + ((k - 1 - j) >> 1);
            placed[l] = true;
            bridge.bridge_index[i] = l;
            bridge.left_index[i] = j;
            bridge.right_index[i] = k;

            let t_left = if j == 0 { 0.0 } else { times[j - 1] };
            let span = times[k] - t_left;
            bridge.left_weight[i] = (times[k] - times[l]) / span;
            bridge.right_weight[i] = (times[l] - t_left) / span;
            bridge.std_dev[i] = ((times[l] - t_left) * (times[k] - times[l]) / span).sqrt();

            j = k + 1;
            if j >= n {
                j = 0;
            }
        }
        bridge
    }

    /// Number of steps.
    #[inline]
    pub fn size(&self) -> usize {
        self.sqrt_dt.len()
    }

    /// Maps `input` normals (most significant first) to standardised
    /// increments in `output`. Both slices have length [`size`](Self::size).
    pub fn transform(&self, input: &[f64], output: &mut [f64]) {
        let n = self.size();
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(output.len(), n);
        if n == 0 {
            return;
        }

        output[n - 1] = self.std_dev[0] * input[0];
        for i in 1..n {
            let (j, k, l) = (self.left_index[i], self.right_index[i], self.bridge_index[i]);
            let left = if j == 0 { 0.0 } else { self.left_weight[i] * output[j - 1] };
            output[l] = left + self.right_weight[i] * output[k] + self.std_dev[i] * input[i];
        }

        for i in (1..n).rev() {
            output[i] = (output[i] - output[i - 1]) / self.sqrt_dt[i];
        }
        output[0] /= self.sqrt_dt[0];
    }
}
