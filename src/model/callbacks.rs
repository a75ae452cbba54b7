//! Training callbacks: early stopping and learning-rate decay on plateau

use tracing::info;

/// Outcome of feeding one epoch's monitored loss to [`EarlyStopping`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// New best; snapshot the weights
    Improved,
    Waiting,
    Stop,
}

/// Stop when the monitored loss has not improved for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn observe(&mut self, epoch: usize, monitored: f64) -> StopSignal {
        if monitored < self.best {
            self.best = monitored;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return StopSignal::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            info!(
                "⏹️ Early stopping at epoch {} (best {:.6} at epoch {:?})",
                epoch, self.best, self.best_epoch
            );
            StopSignal::Stop
        } else {
            StopSignal::Waiting
        }
    }
}

/// Multiply the learning rate by `factor` after `patience` epochs without
/// improvement, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
    best: f64,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta: 1e-4,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// Returns the learning rate to use for the next epoch.
    pub fn observe(&mut self, monitored: f64, lr: f64) -> f64 {
        if monitored < self.best - self.min_delta {
            self.best = monitored;
            self.wait = 0;
            return lr;
        }
        self.wait += 1;
        if self.wait < self.patience || lr <= self.min_lr {
            return lr;
        }
        self.wait = 0;
        let reduced = (lr * self.factor).max(self.min_lr);
        info!("📉 Reducing learning rate {:.6} -> {:.6}", lr, reduced);
        reduced
    }
}
