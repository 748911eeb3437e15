//! Per-class segmentation metrics over the class map.

use crate::common::*;

/// How class scores are turned into positive predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreConvention {
    /// Sigmoid scores thresholded at 0.5.
    Probability,
    /// Raw logits thresholded at 0.0.
    Logit,
}

impl ScoreConvention {
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Probability => 0.5,
            Self::Logit => 0.0,
        }
    }

    pub fn scores(&self, logits: &Tensor) -> Result<Tensor> {
        let scores = match self {
            Self::Probability => logits.f_sigmoid()?,
            Self::Logit => logits.shallow_clone(),
        };
        Ok(scores)
    }
}

impl Default for ScoreConvention {
    fn default() -> Self {
        Self::Logit
    }
}

/// IoU, precision and recall, one entry per class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub iou: Vec<f64>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
}

impl ClassMetrics {
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            iou: vec![0.0; num_classes],
            precision: vec![0.0; num_classes],
            recall: vec![0.0; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.iou.len()
    }

    pub fn mean_iou(&self) -> f64 {
        mean(&self.iou)
    }

    pub fn mean_precision(&self) -> f64 {
        mean(&self.precision)
    }

    pub fn mean_recall(&self) -> f64 {
        mean(&self.recall)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Computes per-class IoU, precision and recall.
///
/// `preds` and `label_masks` share the shape `[..., num_classes]`. A
/// prediction is positive if it exceeds `threshold`, a label if it is
/// non-zero. All leading dimensions are reduced. A ratio whose denominator
/// is zero is reported as 0.
pub fn iou_precision_recall(
    preds: &Tensor,
    label_masks: &Tensor,
    threshold: f64,
) -> Result<ClassMetrics> {
    ensure!(
        preds.size() == label_masks.size(),
        "prediction shape {:?} and label shape {:?} do not match",
        preds.size(),
        label_masks.size()
    );
    let num_classes = *preds
        .size()
        .last()
        .ok_or_else(|| format_err!("the prediction must have a class dimension"))?;

    tch::no_grad(|| -> Result<ClassMetrics> {
        let pred_masks = preds.f_reshape(&[-1, num_classes])?.f_gt(threshold)?;
        let label_masks = label_masks.f_reshape(&[-1, num_classes])?.f_ne(0i64)?;

        let count = |mask: &Tensor| mask.f_sum_dim_intlist(&[0], false, Kind::Float);
        let intersection = count(&pred_masks.f_logical_and(&label_masks)?)?;
        let union = count(&pred_masks.f_logical_or(&label_masks)?)?;
        let predicted = count(&pred_masks)?;
        let labeled = count(&label_masks)?;

        let to_vec = |ratio: Tensor| -> Result<Vec<f64>> {
            Ok(Vec::<f64>::from(&ratio.f_to_kind(Kind::Double)?))
        };

        Ok(ClassMetrics {
            iou: to_vec(intersection.f_div_or_zero(&union)?)?,
            precision: to_vec(intersection.f_div_or_zero(&predicted)?)?,
            recall: to_vec(intersection.f_div_or_zero(&labeled)?)?,
        })
    })
}

/// One-hot masks `[batch, height, width, num_classes]` from a class map of
/// shape `[batch, height, width, 1]`.
pub fn class_masks(classes: &Tensor, num_classes: i64) -> Result<Tensor> {
    let (_batch_size, _height, _width, channels) = classes.size4()?;
    ensure!(
        channels == 1,
        "expect a single class channel, but get {}",
        channels
    );
    tch_modules::check_class_range(classes, num_classes)?;
    let masks = classes
        .f_squeeze_dim(-1)?
        .f_to_kind(Kind::Int64)?
        .f_one_hot(num_classes)?;
    Ok(masks)
}

/// Evaluates class logits against a class map under a score convention.
#[derive(Debug, Clone)]
pub struct PixelMetrics {
    num_classes: i64,
    convention: ScoreConvention,
}

impl PixelMetrics {
    pub fn new(num_classes: usize, convention: ScoreConvention) -> Self {
        Self {
            num_classes: num_classes as i64,
            convention,
        }
    }

    /// `class_logits` is `[batch, height, width, num_classes]` and `classes`
    /// is `[batch, height, width, 1]`.
    pub fn compute(&self, class_logits: &Tensor, classes: &Tensor) -> Result<ClassMetrics> {
        let scores = tch::no_grad(|| self.convention.scores(class_logits))?;
        let masks = class_masks(classes, self.num_classes)?;
        iou_precision_recall(&scores, &masks, self.convention.threshold())
    }
}

/// Running per-class mean over the batches of a phase.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    sum: ClassMetrics,
    num_batches: usize,
}

impl MetricsAccumulator {
    pub fn new(num_classes: usize) -> Self {
        Self {
            sum: ClassMetrics::zeros(num_classes),
            num_batches: 0,
        }
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn add(&mut self, metrics: &ClassMetrics) -> Result<()> {
        ensure!(
            metrics.num_classes() == self.sum.num_classes(),
            "expect metrics for {} classes, but get {}",
            self.sum.num_classes(),
            metrics.num_classes()
        );

        let add = |sum: &mut Vec<f64>, values: &[f64]| {
            sum.iter_mut()
                .zip(values)
                .for_each(|(sum, value)| *sum += value);
        };
        add(&mut self.sum.iou, &metrics.iou);
        add(&mut self.sum.precision, &metrics.precision);
        add(&mut self.sum.recall, &metrics.recall);
        self.num_batches += 1;
        Ok(())
    }

    /// Per-class means, or zeros if nothing was added.
    pub fn mean(&self) -> ClassMetrics {
        if self.num_batches == 0 {
            return ClassMetrics::zeros(self.sum.num_classes());
        }

        let count = self.num_batches as f64;
        let div = |values: &[f64]| values.iter().map(|value| value / count).collect();
        ClassMetrics {
            iou: div(&self.sum.iou),
            precision: div(&self.sum.precision),
            recall: div(&self.sum.recall),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.sum.num_classes());
    }
}
