use super::{LossObjective, PixorLossInit};
use crate::{codec::BoxCodec, common::*};

/// The loss function configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The loss term minimized by the optimizer.
    #[serde(default = "default_objective")]
    pub objective: LossObjective,
    /// The weight factor of the classification loss.
    pub class_loss_weight: Option<R64>,
    /// The weight factor of both box regression losses.
    pub box_loss_weight: Option<R64>,
}

impl Config {
    pub fn pixor_loss_init(&self, num_classes: usize, codec: BoxCodec) -> PixorLossInit {
        let Self {
            objective,
            class_loss_weight,
            box_loss_weight,
        } = *self;

        let mut init = PixorLossInit {
            objective,
            codec,
            ..PixorLossInit::new(num_classes)
        };

        if let Some(class_loss_weight) = class_loss_weight {
            init.class_loss_weight = class_loss_weight.raw();
        }

        if let Some(box_loss_weight) = box_loss_weight {
            init.box_loss_weight = box_loss_weight.raw();
        }

        init
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            class_loss_weight: None,
            box_loss_weight: None,
        }
    }
}

fn default_objective() -> LossObjective {
    LossObjective::Decoded
}
