//! Load ramping.

use workload_types::WorkloadConfig;

/// Decides how many items or capacity units each iteration uses.
///
/// Load starts at `config.load` and is multiplied by `1 + increment_rate` at
/// every positive multiple of `increment_every_n_iterations`, truncated to an
/// integer. When a load limit is set, a ramp that would reach or pass it lands
/// exactly on the limit and stays there.
#[derive(Debug, Clone)]
pub struct LoadController {
    current: u64,
    rate: f64,
    every: u64,
    limit: Option<u64>,
}

impl LoadController {
    pub fn new(config: &WorkloadConfig) -> Self {
        Self {
            current: config.load,
            rate: config.increment_rate,
            every: config.increment_every_n_iterations.max(1),
            limit: config.limit(),
        }
    }

    /// Load for `iteration` (zero-based). Must be called once per iteration, in order.
    pub fn next_load(&mut self, iteration: u64) -> u64 {
        if iteration > 0 && iteration % self.every == 0 {
            let candidate = (self.current as f64 * (1.0 + self.rate)).floor() as u64;
            self.current = match self.limit {
                Some(limit) if candidate >= limit => limit,
                _ => candidate,
            };
        }
        self.current
    }

    pub fn current(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(load: u64, rate: f64, every: u64, limit: i64) -> WorkloadConfig {
        WorkloadConfig {
            load,
            increment_rate: rate,
            increment_every_n_iterations: every,
            load_limit: limit,
            ..WorkloadConfig::default()
        }
    }

    fn ramp(config: &WorkloadConfig, iterations: u64) -> Vec<u64> {
        let mut controller = LoadController::new(config);
        (0..iterations).map(|i| controller.next_load(i)).collect()
    }

    #[test]
    fn test_ramp_with_limit() {
        // 10 * 2 = 20 at iteration 2, clamped to 15
        let loads = ramp(&config(10, 1.0, 2, 15), 6);
        assert_eq!(loads, vec![10, 10, 15, 15, 15, 15]);
    }

    #[test]
    fn test_zero_rate_keeps_load_constant() {
        let loads = ramp(&config(300, 0.0, 1, -1), 50);
        assert!(loads.iter().all(|&l| l == 300));
    }

    #[test]
    fn test_unbounded_ramp_truncates() {
        // 10 -> 13 -> 16 -> 20
        let loads = ramp(&config(10, 0.3, 1, -1), 4);
        assert_eq!(loads, vec![10, 13, 16, 20]);
    }

    #[test]
    fn test_limit_is_never_exceeded() {
        for rate in [0.1, 0.3, 1.0, 2.5] {
            for limit in [0, 1, 7, 100, 1000] {
                let loads = ramp(&config(5, rate, 3, limit), 60);
                assert!(
                    loads.iter().skip(3).all(|&l| l <= limit as u64),
                    "rate {rate} limit {limit}: {loads:?}"
                );
            }
        }
    }

    #[test]
    fn test_first_iteration_never_ramps() {
        let mut controller = LoadController::new(&config(10, 1.0, 1, -1));
        assert_eq!(controller.next_load(0), 10);
        assert_eq!(controller.next_load(1), 20);
        assert_eq!(controller.current(), 20);
    }
}
