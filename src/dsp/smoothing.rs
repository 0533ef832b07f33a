//! Exponential moving average over PSD frames.

/// Stateful EMA across frames.
///
/// The first update after construction or [`EmaFilter::reset`] copies its input.
#[derive(Debug, Clone)]
pub struct EmaFilter {
    alpha: f32,
    state: Vec<f32>,
    initialized: bool,
}

impl EmaFilter {
    pub fn new(alpha: f32, size: usize) -> Self {
        Self {
            alpha,
            state: vec![0.0; size],
            initialized: false,
        }
    }

    /// `state = alpha * input + (1 - alpha) * state`, returning the new state.
    pub fn update(&mut self, input: &[f32]) -> &[f32] {
        debug_assert_eq!(input.len(), self.state.len());

        if !self.initialized {
            self.state.copy_from_slice(input);
            self.initialized = true;
            return &self.state;
        }

        // Incremental form keeps a constant input an exact fixed point
        for (s, &x) in self.state.iter_mut().zip(input) {
            *s += self.alpha * (x - *s);
        }
        &self.state
    }

    pub fn reset(&mut self) {
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> Option<&[f32]> {
        self.initialized.then_some(self.state.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_copies() {
        let mut ema = EmaFilter::new(0.1, 3);
        assert!(ema.state().is_none());
        assert_eq!(ema.update(&[1.0, 2.0, 3.0]), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_update_blends() {
        let mut ema = EmaFilter::new(0.25, 2);
        ema.update(&[0.0, 8.0]);
        let out = ema.update(&[4.0, 0.0]);
        assert_eq!(out, &[1.0, 6.0]);
    }

    #[test]
    fn test_alpha_one_tracks_input() {
        let mut ema = EmaFilter::new(1.0, 2);
        ema.update(&[5.0, 5.0]);
        assert_eq!(ema.update(&[-1.0, 2.0]), &[-1.0, 2.0]);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut ema = EmaFilter::new(0.5, 1);
        ema.update(&[10.0]);
        ema.update(&[0.0]);
        ema.reset();
        assert!(!ema.is_initialized());
        assert_eq!(ema.update(&[3.0]), &[3.0]);
    }
}
