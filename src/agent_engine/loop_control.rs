// Step budget and per-step deadline for one agent run.
use std::future::Future;
use std::time::Duration;

pub struct LoopController {
    max_iterations: u32,
    step_timeout: Duration,
    step: u32,
}

impl LoopController {
    pub fn new(max_iterations: u32, step_timeout: Duration) -> Self {
        Self {
            max_iterations,
            step_timeout,
            step: 0,
        }
    }

    /// Steps started so far.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Start the next step, or `None` once the budget is spent.
    pub fn next_step(&mut self) -> Option<u32> {
        if self.step >= self.max_iterations {
            tracing::info!(max = self.max_iterations, "iteration budget reached");
            return None;
        }
        self.step += 1;
        Some(self.step)
    }

    /// Run one step under the deadline. `None` means it timed out and the
    /// step's future was dropped.
    pub async fn run_step<F: Future>(&self, step: F) -> Option<F::Output> {
        match tokio::time::timeout(self.step_timeout, step).await {
            Ok(output) => Some(output),
            Err(_) => {
                tracing::warn!(step = self.step, timeout = ?self.step_timeout, "step timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_counts_steps() {
        let mut ctl = LoopController::new(3, Duration::from_secs(1));
        assert_eq!(ctl.next_step(), Some(1));
        assert_eq!(ctl.next_step(), Some(2));
        assert_eq!(ctl.next_step(), Some(3));
        assert_eq!(ctl.next_step(), None);
        assert_eq!(ctl.step(), 3);
        assert_eq!(LoopController::new(0, Duration::ZERO).next_step(), None);
    }

    #[tokio::test]
    async fn slow_steps_are_cut_off() {
        let ctl = LoopController::new(1, Duration::from_millis(20));
        assert_eq!(ctl.run_step(async { 7 }).await, Some(7));
        let slow = ctl
            .run_step(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                7
            })
            .await;
        assert_eq!(slow, None);
    }
}
