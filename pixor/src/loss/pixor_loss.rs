use crate::{codec::BoxCodec, common::*, model::PixorOutput};
use crate::codec::ENCODING_CHANNELS;
use tch_modules::{CrossEntropyLoss, SmoothL1Loss};

/// Selects the box regression term that enters the training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossObjective {
    /// Smooth L1 on the raw 6-channel encoding.
    Encoded,
    /// Smooth L1 on the decoded box corners.
    Decoded,
}

#[derive(Debug, Clone)]
pub struct PixorLossInit {
    pub num_classes: usize,
    pub class_loss_weight: f64,
    pub box_loss_weight: f64,
    pub objective: LossObjective,
    pub codec: BoxCodec,
}

impl PixorLossInit {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            class_loss_weight: 10.0,
            box_loss_weight: 100.0,
            objective: LossObjective::Decoded,
            codec: BoxCodec::default(),
        }
    }

    pub fn build(self) -> Result<PixorLoss> {
        let Self {
            num_classes,
            class_loss_weight,
            box_loss_weight,
            objective,
            codec,
        } = self;

        ensure!(num_classes > 0, "num_classes must be positive");
        ensure!(
            class_loss_weight >= 0.0,
            "class_loss_weight must be non-negative"
        );
        ensure!(
            box_loss_weight >= 0.0,
            "box_loss_weight must be non-negative"
        );

        Ok(PixorLoss {
            num_classes: num_classes as i64,
            class_loss_weight,
            box_loss_weight,
            objective,
            codec,
            cross_entropy: CrossEntropyLoss::new(Reduction::Mean),
            smooth_l1: SmoothL1Loss::new(Reduction::Mean),
        })
    }
}

#[derive(Debug)]
pub struct PixorLoss {
    num_classes: i64,
    class_loss_weight: f64,
    box_loss_weight: f64,
    objective: LossObjective,
    codec: BoxCodec,
    cross_entropy: CrossEntropyLoss,
    smooth_l1: SmoothL1Loss,
}

impl PixorLoss {
    pub fn objective(&self) -> LossObjective {
        self.objective
    }

    pub fn codec(&self) -> &BoxCodec {
        &self.codec
    }

    /// Computes every loss term for a batch.
    ///
    /// `box_labels` has shape `[batch, height, width, 6]` and `class_labels`
    /// has shape `[batch, height, width, 1]` with `int64` class ids. Box
    /// terms only count pixels with a positive class.
    pub fn forward(
        &self,
        prediction: &PixorOutput,
        box_labels: &Tensor,
        class_labels: &Tensor,
    ) -> Result<PixorLossOutput> {
        let PixorOutput {
            class_logits,
            boxes,
        } = prediction;
        let (batch_size, height, width, num_classes) = class_logits.size4()?;
        ensure!(
            num_classes == self.num_classes,
            "expect {} class channels, but get {}",
            self.num_classes,
            num_classes
        );
        ensure!(
            class_labels.size() == [batch_size, height, width, 1],
            "expect class labels of shape {:?}, but get {:?}",
            [batch_size, height, width, 1],
            class_labels.size()
        );
        ensure!(
            boxes.size() == box_labels.size()
                && box_labels.size() == [batch_size, height, width, ENCODING_CHANNELS as i64],
            "box prediction shape {:?} and label shape {:?} do not match",
            boxes.size(),
            box_labels.size()
        );

        let classes = class_labels.f_squeeze_dim(-1)?;
        let positive = classes.f_gt(0i64)?;

        let class_loss = self.class_loss(class_logits, &classes)?;
        let box_loss = self.encoded_box_loss(boxes, box_labels, &positive)?;
        let decode_loss = self.decoded_box_loss(boxes, box_labels, &positive)?;

        let pixor_loss = &class_loss + &box_loss;
        let decode_pixor_loss = &class_loss + &decode_loss;
        let total_loss = match self.objective {
            LossObjective::Encoded => pixor_loss.shallow_clone(),
            LossObjective::Decoded => decode_pixor_loss.shallow_clone(),
        };

        Ok(PixorLossOutput {
            total_loss,
            class_loss,
            box_loss,
            decode_loss,
            pixor_loss,
            decode_pixor_loss,
        })
    }

    /// Weighted mean cross entropy over all pixels.
    pub fn class_loss(&self, class_logits: &Tensor, classes: &Tensor) -> Result<Tensor> {
        let loss = self.cross_entropy.forward(class_logits, classes)?;
        Ok(loss * self.class_loss_weight)
    }

    /// Weighted smooth L1 on the encoding channels of positive pixels.
    pub fn encoded_box_loss(
        &self,
        boxes: &Tensor,
        box_labels: &Tensor,
        positive: &Tensor,
    ) -> Result<Tensor> {
        let mask = positive.f_unsqueeze(-1)?;
        let loss = self.smooth_l1.forward_masked(boxes, box_labels, &mask)?;
        Ok(loss * self.box_loss_weight)
    }

    /// Weighted smooth L1 on the decoded corners of positive pixels.
    ///
    /// Prediction and label go through the same [BoxCodec].
    pub fn decoded_box_loss(
        &self,
        boxes: &Tensor,
        box_labels: &Tensor,
        positive: &Tensor,
    ) -> Result<Tensor> {
        let pred_corners = self.codec.decode(boxes)?;
        let label_corners = self.codec.decode(&box_labels.f_to_kind(boxes.kind())?)?;
        let mask = positive.f_unsqueeze(-1)?.f_unsqueeze(-1)?;
        let loss = self
            .smooth_l1
            .forward_masked(&pred_corners, &label_corners, &mask)?;
        Ok(loss * self.box_loss_weight)
    }
}

#[derive(Debug, TensorLike)]
pub struct PixorLossOutput {
    /// The loss selected by the configured objective.
    pub total_loss: Tensor,
    pub class_loss: Tensor,
    pub box_loss: Tensor,
    pub decode_loss: Tensor,
    /// `class_loss + box_loss`
    pub pixor_loss: Tensor,
    /// `class_loss + decode_loss`
    pub decode_pixor_loss: Tensor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labels() -> (Tensor, Tensor) {
        let classes = Tensor::zeros(&[1, 4, 4, 1], (Kind::Int64, Device::Cpu));
        let _ = classes.narrow(1, 0, 2).fill_(1i64);
        let boxes = Tensor::randn(&[1, 4, 4, 6], (Kind::Float, Device::Cpu));
        (boxes, classes)
    }

    #[test]
    fn perfect_boxes_leave_class_loss_only() -> Result<()> {
        let loss_fn = PixorLossInit::new(2).build()?;
        let (box_labels, class_labels) = labels();
        let prediction = PixorOutput {
            class_logits: Tensor::zeros(&[1, 4, 4, 2], (Kind::Float, Device::Cpu)),
            boxes: box_labels.shallow_clone(),
        };

        let output = loss_fn.forward(&prediction, &box_labels, &class_labels)?;
        assert_abs_diff_eq!(f64::from(&output.box_loss), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f64::from(&output.decode_loss), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            f64::from(&output.class_loss),
            10.0 * 2f64.ln(),
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(
            f64::from(&output.total_loss),
            f64::from(&output.decode_pixor_loss)
        );
        Ok(())
    }

    #[test]
    fn background_boxes_are_ignored() -> Result<()> {
        let loss_fn = PixorLossInit {
            objective: LossObjective::Encoded,
            ..PixorLossInit::new(2)
        }
        .build()?;
        let (box_labels, class_labels) = labels();

        // corrupt the box prediction on background rows only
        let boxes = box_labels.copy();
        let _ = boxes.narrow(1, 2, 2).fill_(1000.0);
        let prediction = PixorOutput {
            class_logits: Tensor::zeros(&[1, 4, 4, 2], (Kind::Float, Device::Cpu)),
            boxes,
        };

        let output = loss_fn.forward(&prediction, &box_labels, &class_labels)?;
        assert_abs_diff_eq!(f64::from(&output.box_loss), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f64::from(&output.decode_loss), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(
            f64::from(&output.total_loss),
            f64::from(&output.pixor_loss)
        );
        Ok(())
    }

    #[test]
    fn box_loss_weight_scales_regression() -> Result<()> {
        let (box_labels, class_labels) = labels();
        let prediction = PixorOutput {
            class_logits: Tensor::zeros(&[1, 4, 4, 2], (Kind::Float, Device::Cpu)),
            boxes: &box_labels + 0.5,
        };

        let weighted = PixorLossInit::new(2)
            .build()?
            .forward(&prediction, &box_labels, &class_labels)?;
        let unit = PixorLossInit {
            box_loss_weight: 1.0,
            ..PixorLossInit::new(2)
        }
        .build()?
        .forward(&prediction, &box_labels, &class_labels)?;

        // every positive channel is off by 0.5, so smooth L1 is 0.125
        assert_abs_diff_eq!(f64::from(&unit.box_loss), 0.125, epsilon = 1e-6);
        assert_abs_diff_eq!(
            f64::from(&weighted.box_loss),
            100.0 * f64::from(&unit.box_loss),
            epsilon = 1e-4
        );
        Ok(())
    }

    #[test]
    fn reject_out_of_range_class() -> Result<()> {
        let loss_fn = PixorLossInit::new(2).build()?;
        let (box_labels, _) = labels();
        let class_labels = Tensor::full(&[1, 4, 4, 1], 2i64, (Kind::Int64, Device::Cpu));
        let prediction = PixorOutput {
            class_logits: Tensor::zeros(&[1, 4, 4, 2], (Kind::Float, Device::Cpu)),
            boxes: box_labels.shallow_clone(),
        };
        assert!(loss_fn
            .forward(&prediction, &box_labels, &class_labels)
            .is_err());
        Ok(())
    }

    #[test]
    fn objective_config_defaults() -> Result<()> {
        let config = crate::loss::Config::default();
        let init = config.pixor_loss_init(3, BoxCodec::default());
        assert_eq!(init.objective, LossObjective::Decoded);
        assert_abs_diff_eq!(init.class_loss_weight, 10.0);
        assert_abs_diff_eq!(init.box_loss_weight, 100.0);
        Ok(())
    }
}
