//! Training program configuration format.

use crate::common::*;
use pixor::{codec::BoxCodec, model::DOWNSAMPLE_FACTOR};

pub use dataset::*;
pub use model::*;
pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    pub fn from_json5(text: &str) -> Result<Self> {
        let config: Self = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the format itself cannot express.
    pub fn validate(&self) -> Result<()> {
        let ModelConfig::Pixor(model) = &self.model;
        let tile_size = model.tile_size.get();
        ensure!(
            tile_size as i64 % DOWNSAMPLE_FACTOR == 0,
            "tile_size must be a multiple of {}, but get {}",
            DOWNSAMPLE_FACTOR,
            tile_size
        );
        if let Some(class_names) = &model.class_names {
            ensure!(
                class_names.len() == model.num_classes.get(),
                "expect {} class names, but get {}",
                model.num_classes,
                class_names.len()
            );
        }
        ensure!(model.box_unit > 0.0, "box_unit must be positive");
        ensure!(
            !model.name.is_empty() && !model.name.contains(std::path::is_separator),
            "model name '{}' is not a valid file name",
            model.name
        );

        let training = &self.training;
        ensure!(training.num_epochs > 0, "num_epochs must be positive");
        ensure!(
            training.learning_rate > 0.0,
            "learning_rate must be positive"
        );
        if let OptimizerConfig::Sgd { momentum } = training.optimizer {
            ensure!(
                momentum >= 0.0 && momentum < 1.0,
                "momentum must be in range [0, 1)"
            );
        }
        training
            .loss
            .pixor_loss_init(model.num_classes.get(), model.box_codec()?)
            .build()?;

        Ok(())
    }
}

mod model {
    use super::*;

    /// The model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    pub enum ModelConfig {
        Pixor(PixorModelConfig),
    }

    impl ModelConfig {
        pub fn pixor(&self) -> &PixorModelConfig {
            let Self::Pixor(config) = self;
            config
        }
    }

    /// The PIXOR model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PixorModelConfig {
        /// Names the log and checkpoint files.
        pub name: String,
        /// The side length of input tiles.
        pub tile_size: NonZeroUsize,
        pub num_classes: NonZeroUsize,
        /// Class names used in metric names. Class indices are used if not set.
        pub class_names: Option<Vec<String>>,
        /// The distance unit of box encodings.
        #[serde(default = "default_box_unit")]
        pub box_unit: R64,
    }

    impl PixorModelConfig {
        pub fn class_names(&self) -> Vec<String> {
            match &self.class_names {
                Some(names) => names.clone(),
                None => (0..self.num_classes.get())
                    .map(|index| index.to_string())
                    .collect(),
            }
        }

        pub fn box_codec(&self) -> Result<BoxCodec> {
            BoxCodec::new(self.box_unit.raw())
        }
    }

    fn default_box_unit() -> R64 {
        r64(1.0)
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Each run creates a timestamped sub-directory here.
    pub dir: PathBuf,
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        pub train_dir: PathBuf,
        pub val_dir: PathBuf,
        /// The directory with `mean.npy`, `std.npy`, `train_mean.npy` and `train_std.npy`.
        pub stats_dir: PathBuf,
        /// Normalize box labels of positive pixels.
        #[serde(default = "default_normalize_boxes")]
        pub normalize_boxes: bool,
    }

    fn default_normalize_boxes() -> bool {
        true
    }
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        /// The batch size.
        pub batch_size: NonZeroUsize,
        pub num_epochs: usize,
        #[serde(default = "default_learning_rate")]
        pub learning_rate: R64,
        #[serde(default)]
        pub optimizer: OptimizerConfig,
        /// The loss function options.
        #[serde(default)]
        pub loss: pixor::loss::Config,
        #[serde(default)]
        pub metrics: MetricsConfig,
        /// The training device.
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
        /// Seeds the shuffling of samples if set.
        pub seed: Option<u64>,
        /// Checkpoint file loading method.
        #[serde(default)]
        pub load_checkpoint: LoadCheckpoint,
    }

    /// The optimizer and its options.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum OptimizerConfig {
        Adam,
        Sgd { momentum: R64 },
    }

    impl Default for OptimizerConfig {
        fn default() -> Self {
            Self::Adam
        }
    }

    /// The metrics options.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct MetricsConfig {
        /// How class logits are thresholded into positive predictions.
        #[serde(default)]
        pub convention: ScoreConvention,
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the checkpoint of the most recent run.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    impl Default for LoadCheckpoint {
        fn default() -> Self {
            Self::Disabled
        }
    }

    fn default_learning_rate() -> R64 {
        r64(1e-4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixor::loss::LossObjective;

    const MINIMAL: &str = r#"{
        model: { kind: "Pixor", name: "pixor", tile_size: 224, num_classes: 2 },
        dataset: { train_dir: "data/train", val_dir: "data/val", stats_dir: "data" },
        training: { batch_size: 4, num_epochs: 10, device: "cpu" },
        logging: { dir: "logs" },
    }"#;

    #[test]
    fn defaults() -> Result<()> {
        let config = Config::from_json5(MINIMAL)?;
        let model = config.model.pixor();
        assert_eq!(model.class_names(), vec!["0", "1"]);
        assert_eq!(model.box_unit, 1.0);
        assert!(config.dataset.normalize_boxes);

        let training = &config.training;
        assert_eq!(training.learning_rate, 1e-4);
        assert!(matches!(training.optimizer, OptimizerConfig::Adam));
        assert_eq!(training.loss.objective, LossObjective::Decoded);
        assert_eq!(training.metrics.convention, ScoreConvention::Logit);
        assert_eq!(training.device, Device::Cpu);
        assert!(matches!(training.load_checkpoint, LoadCheckpoint::Disabled));
        Ok(())
    }

    #[test]
    fn full_config() -> Result<()> {
        let text = r#"{
            model: {
                kind: "Pixor",
                name: "buildings",
                tile_size: 64,
                num_classes: 2,
                class_names: ["background", "building"],
                box_unit: 4.0,
            },
            dataset: {
                train_dir: "data/train",
                val_dir: "data/val",
                stats_dir: "data",
                normalize_boxes: false,
            },
            training: {
                batch_size: 8,
                num_epochs: 3,
                learning_rate: 0.001,
                optimizer: { type: "Sgd", momentum: 0.9 },
                loss: { objective: "encoded", class_loss_weight: 1.0 },
                metrics: { convention: "probability" },
                device: "cpu",
                seed: 7,
                load_checkpoint: { type: "FromFile", file: "model.ckpt" },
            },
            logging: { dir: "logs" },
        }"#;
        let config = Config::from_json5(text)?;
        assert_eq!(config.model.pixor().class_names(), vec!["background", "building"]);
        assert!(matches!(
            config.training.optimizer,
            OptimizerConfig::Sgd { momentum } if momentum == 0.9
        ));
        assert_eq!(config.training.loss.objective, LossObjective::Encoded);
        assert_eq!(config.training.metrics.convention, ScoreConvention::Probability);
        assert_eq!(config.training.seed, Some(7));
        Ok(())
    }

    #[test]
    fn reject_unknown_names() {
        let unknown_objective = MINIMAL.replace(
            "device: \"cpu\"",
            "device: \"cpu\", loss: { objective: \"corner\" }",
        );
        let err = Config::from_json5(&unknown_objective).unwrap_err();
        assert!(err.to_string().contains("corner"));

        let unknown_model = MINIMAL.replace("\"Pixor\"", "\"RefineNet\"");
        assert!(Config::from_json5(&unknown_model).is_err());

        let unknown_optimizer = MINIMAL.replace(
            "device: \"cpu\"",
            "device: \"cpu\", optimizer: { type: \"Lamb\" }",
        );
        assert!(Config::from_json5(&unknown_optimizer).is_err());
    }

    #[test]
    fn reject_invalid_values() {
        let unaligned = MINIMAL.replace("tile_size: 224", "tile_size: 100");
        assert!(Config::from_json5(&unaligned).is_err());

        let names = MINIMAL.replace("num_classes: 2", "num_classes: 2, class_names: [\"a\"]");
        assert!(Config::from_json5(&names).is_err());

        let negative_weight = MINIMAL.replace(
            "device: \"cpu\"",
            "device: \"cpu\", loss: { box_loss_weight: -1.0 }",
        );
        assert!(Config::from_json5(&negative_weight).is_err());
    }
}
