use crate::common::*;

/// The two phases of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Train,
    Val,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running loss means and per-class metrics of one phase.
#[derive(Debug, Clone)]
pub struct PhaseStats {
    num_batches: usize,
    total_loss: f64,
    class_loss: f64,
    box_loss: f64,
    decode_loss: f64,
    metrics: MetricsAccumulator,
}

impl PhaseStats {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_batches: 0,
            total_loss: 0.0,
            class_loss: 0.0,
            box_loss: 0.0,
            decode_loss: 0.0,
            metrics: MetricsAccumulator::new(num_classes),
        }
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn add(&mut self, losses: &PixorLossOutput, metrics: &ClassMetrics) -> Result<()> {
        self.metrics.add(metrics)?;
        self.total_loss += f64::from(&losses.total_loss);
        self.class_loss += f64::from(&losses.class_loss);
        self.box_loss += f64::from(&losses.box_loss);
        self.decode_loss += f64::from(&losses.decode_loss);
        self.num_batches += 1;
        Ok(())
    }

    /// The mean objective loss over the batches seen so far.
    pub fn epoch_loss(&self) -> f64 {
        self.mean(self.total_loss)
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.num_batches == 0 {
            0.0
        } else {
            sum / self.num_batches as f64
        }
    }

    /// The flat metric mapping, with per-class entries named
    /// `class_<name>_<metric>`.
    pub fn to_metrics(&self, class_names: &[String]) -> Result<IndexMap<String, f64>> {
        let mean = self.metrics.mean();
        ensure!(
            class_names.len() == mean.num_classes(),
            "expect {} class names, but get {}",
            mean.num_classes(),
            class_names.len()
        );

        let mut map = IndexMap::new();
        map.insert("epoch_loss".to_string(), self.epoch_loss());
        map.insert("class_loss".to_string(), self.mean(self.class_loss));
        map.insert("box_loss".to_string(), self.mean(self.box_loss));
        map.insert("decode_loss".to_string(), self.mean(self.decode_loss));
        map.insert("mean_iou".to_string(), mean.mean_iou());
        map.insert("mean_prec".to_string(), mean.mean_precision());
        map.insert("mean_recall".to_string(), mean.mean_recall());

        for (name, &iou, &precision, &recall) in
            itertools::izip!(class_names, &mean.iou, &mean.precision, &mean.recall)
        {
            map.insert(format!("class_{}_iou", name), iou);
            map.insert(format!("class_{}_prec", name), precision);
            map.insert(format!("class_{}_recall", name), recall);
        }

        Ok(map)
    }
}

/// The lowest validation loss seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestValLoss {
    best: f64,
}

impl BestValLoss {
    pub fn new() -> Self {
        Self {
            best: f64::INFINITY,
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Records `loss` and returns true only if it is strictly lower than
    /// every loss recorded before. NaN never improves.
    pub fn update(&mut self, loss: f64) -> bool {
        if loss < self.best {
            self.best = loss;
            true
        } else {
            false
        }
    }
}

impl Default for BestValLoss {
    fn default() -> Self {
        Self::new()
    }
}
