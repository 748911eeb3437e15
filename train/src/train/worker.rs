use super::{BestValLoss, Phase, PhaseStats};
use crate::{
    common::*,
    config::{Config, OptimizerConfig},
    logging::{LoggingMessage, PhaseMetricsLog, TrainingStepLog},
    model::Model,
    utils,
};

/// Start the training worker on the configured device.
///
/// Each epoch shuffles both datasets, runs the train phase and then the val
/// phase, and saves a checkpoint whenever the val loss improves.
pub fn training_worker(
    config: Arc<Config>,
    checkpoint_dir: Arc<Path>,
    logging_tx: broadcast::Sender<LoggingMessage>,
) -> Result<()> {
    let device = config.training.device;
    info!("use device {:?}", device);

    let model_config = config.model.pixor();
    let class_names = model_config.class_names();
    let num_classes = model_config.num_classes.get();
    let batch_size = config.training.batch_size.get();
    let learning_rate = config.training.learning_rate.raw();

    // load datasets
    let (mut train_loader, mut val_loader) = {
        let stats = Arc::new(NormStats::load(&config.dataset.stats_dir)?);
        let init = BatchLoaderInit {
            tile_size: model_config.tile_size.get(),
            num_classes,
            normalize_boxes: config.dataset.normalize_boxes,
        };
        let train_loader = init.clone().build(&config.dataset.train_dir, stats.clone())?;
        let val_loader = init.build(&config.dataset.val_dir, stats)?;
        (train_loader, val_loader)
    };
    for (phase, loader) in [(Phase::Train, &train_loader), (Phase::Val, &val_loader)] {
        info!(
            "{} set: {} samples of {}x{} tiles in '{}'",
            phase,
            loader.len(),
            loader.tile_size(),
            loader.tile_size(),
            loader.root().display()
        );
    }
    ensure!(
        train_loader.num_batches(batch_size) > 0,
        "the training set has {} samples, fewer than the batch size {}",
        train_loader.len(),
        batch_size
    );
    if val_loader.num_batches(batch_size) == 0 {
        warn!(
            "the validation set has {} samples, fewer than the batch size {}",
            val_loader.len(),
            batch_size
        );
    }

    // init model
    info!("initializing model");
    let mut vs = nn::VarStore::new(device);
    let model = Model::new(&vs.root(), &config)?;

    // load checkpoint
    utils::try_load_checkpoint(
        &mut vs,
        &config.logging.dir,
        &model_config.name,
        &config.training.load_checkpoint,
    )?;

    let mut backward_step: Box<dyn FnMut(&Tensor)> = match config.training.optimizer {
        OptimizerConfig::Adam => {
            let mut optimizer = nn::Adam::default().build(&vs, learning_rate)?;
            Box::new(move |loss: &Tensor| optimizer.backward_step(loss))
        }
        OptimizerConfig::Sgd { momentum } => {
            let mut optimizer = nn::Sgd {
                momentum: momentum.raw(),
                ..Default::default()
            }
            .build(&vs, learning_rate)?;
            Box::new(move |loss: &Tensor| optimizer.backward_step(loss))
        }
    };

    let mut rng = match config.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut best_val_loss = BestValLoss::new();
    let mut training_step = 0;

    info!("start training");
    for epoch in 1..=config.training.num_epochs {
        for phase in [Phase::Train, Phase::Val] {
            let loader = match phase {
                Phase::Train => &mut train_loader,
                Phase::Val => &mut val_loader,
            };
            loader.shuffle(&mut rng);

            let mut stats = PhaseStats::new(num_classes);
            for batch_index in 0..loader.num_batches(batch_size) {
                let batch = loader.get_batch(batch_index * batch_size, batch_size)?;

                match phase {
                    Phase::Train => {
                        let output = model.forward(&batch)?;
                        backward_step(&output.losses.total_loss);
                        stats.add(&output.losses, &output.metrics)?;

                        logging_tx
                            .send(LoggingMessage::new_training_step(
                                "training-step",
                                TrainingStepLog::new(epoch, training_step, &output.losses),
                            ))
                            .map_err(|_| format_err!("cannot send message to logger"))?;
                        training_step += 1;
                    }
                    Phase::Val => {
                        let output = tch::no_grad(|| model.forward(&batch))?;
                        stats.add(&output.losses, &output.metrics)?;
                    }
                }
            }

            let metrics = stats.to_metrics(&class_names)?;
            logging_tx
                .send(LoggingMessage::new_phase_metrics(
                    "phase-metrics",
                    PhaseMetricsLog {
                        epoch,
                        phase,
                        metrics,
                    },
                ))
                .map_err(|_| format_err!("cannot send message to logger"))?;

            // save checkpoint
            if phase == Phase::Val && stats.num_batches() > 0 {
                let val_loss = stats.epoch_loss();
                if best_val_loss.update(val_loss) {
                    utils::save_checkpoint(&vs, &checkpoint_dir, &model_config.name, val_loss)?;
                }
            }
        }
    }

    info!("training finished after {} steps", training_step);
    Ok(())
}
