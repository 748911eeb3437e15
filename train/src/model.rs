//! The model adaptor.

use crate::{common::*, config::Config};

/// The network with its loss function and pixel metrics.
#[derive(Debug)]
pub struct Model {
    network: PixorModel,
    loss_fn: PixorLoss,
    metrics: PixelMetrics,
    device: Device,
}

/// Everything computed for one batch.
#[derive(Debug)]
pub struct ModelOutput {
    pub output: PixorOutput,
    pub losses: PixorLossOutput,
    pub metrics: ClassMetrics,
}

/// The result of [Model::evaluate].
#[derive(Debug)]
pub struct Evaluation {
    /// The loss of the configured objective.
    pub loss: f64,
    pub boxes: Tensor,
    pub class_logits: Tensor,
    pub classes: Tensor,
}

impl Model {
    pub fn new<'a>(path: impl Borrow<nn::Path<'a>>, config: &Config) -> Result<Self> {
        let path = path.borrow();
        let model_config = config.model.pixor();
        let num_classes = model_config.num_classes.get();

        let network = PixorModelInit::new(num_classes).build(path / "pixor")?;
        let loss_fn = config
            .training
            .loss
            .pixor_loss_init(num_classes, model_config.box_codec()?)
            .build()?;
        let metrics = PixelMetrics::new(num_classes, config.training.metrics.convention);

        Ok(Self {
            network,
            loss_fn,
            metrics,
            device: path.device(),
        })
    }

    /// Runs the network, all losses and the metrics on a batch.
    pub fn forward(&self, batch: &PixorBatch) -> Result<ModelOutput> {
        let PixorBatch {
            images,
            boxes,
            classes,
        } = batch.to_device(self.device);

        let output = self.network.forward(&images)?;
        let losses = self.loss_fn.forward(&output, &boxes, &classes)?;
        let metrics = self.metrics.compute(&output.class_logits, &classes)?;

        Ok(ModelOutput {
            output,
            losses,
            metrics,
        })
    }

    /// Computes the objective loss and raw predictions without gradients.
    pub fn evaluate(&self, batch: &PixorBatch) -> Result<Evaluation> {
        let ModelOutput {
            output: PixorOutput {
                class_logits,
                boxes,
            },
            losses,
            ..
        } = tch::no_grad(|| self.forward(batch))?;

        Ok(Evaluation {
            loss: f64::from(&losses.total_loss),
            boxes,
            class_logits,
            classes: batch.classes.shallow_clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_batch() -> Result<()> {
        let config = Config::from_json5(
            r#"{
                model: { kind: "Pixor", name: "pixor", tile_size: 16, num_classes: 2 },
                dataset: { train_dir: "train", val_dir: "val", stats_dir: "." },
                training: { batch_size: 2, num_epochs: 1, device: "cpu" },
                logging: { dir: "logs" },
            }"#,
        )?;
        let vs = nn::VarStore::new(Device::Cpu);
        let model = Model::new(&vs.root(), &config)?;

        let batch = PixorBatch {
            images: Tensor::rand(&[2, 16, 16, 3], (Kind::Float, Device::Cpu)),
            boxes: Tensor::randn(&[2, 16, 16, 6], (Kind::Float, Device::Cpu)),
            classes: Tensor::randint(2, &[2, 16, 16, 1], (Kind::Int64, Device::Cpu)),
        };
        let eval = model.evaluate(&batch)?;
        assert!(eval.loss.is_finite() && eval.loss > 0.0);
        assert_eq!(eval.boxes.size(), vec![2, 16, 16, 6]);
        assert_eq!(eval.class_logits.size(), vec![2, 16, 16, 2]);
        assert!(eval.classes.equal(&batch.classes));
        Ok(())
    }
}
