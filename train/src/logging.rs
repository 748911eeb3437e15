//! Data logging toolkit.

use crate::{common::*, config::Config, train::Phase};
use tokio::{
    fs::File,
    io::{AsyncWriteExt as _, BufWriter},
};

pub use logging_message::*;
pub use logging_worker::*;

mod logging_worker {
    use super::*;

    /// The data logging worker.
    #[derive(Debug)]
    pub struct LoggingWorker {
        log_file: BufWriter<File>,
        rx: broadcast::Receiver<LoggingMessage>,
    }

    impl LoggingWorker {
        /// Create a data logging worker.
        async fn new(
            config: Arc<Config>,
            logging_dir: Arc<Path>,
            rx: broadcast::Receiver<LoggingMessage>,
        ) -> Result<Self> {
            let path = logging_dir.join(format!("{}.log", config.model.pixor().name));
            let log_file = File::create(&path)
                .await
                .with_context(|| format!("failed to create log file '{}'", path.display()))?;
            info!("write metrics to '{}'", path.display());

            Ok(Self {
                log_file: BufWriter::new(log_file),
                rx,
            })
        }

        /// Start the data logging worker.
        async fn start(mut self) -> Result<()> {
            loop {
                let LoggingMessage { tag, kind } = match self.rx.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!("logging worker skipped {} messages", count);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match kind {
                    LoggingMessageKind::PhaseMetrics(msg) => {
                        self.log_phase_metrics(msg).await?;
                    }
                    LoggingMessageKind::TrainingStep(msg) => {
                        let TrainingStepLog {
                            epoch,
                            step,
                            total_loss,
                            class_loss,
                            box_loss,
                            decode_loss,
                        } = msg;
                        debug!(
                            "{}\tepoch: {}\tstep: {}\tloss: {:.5}\tclass: {:.5}\tbox: {:.5}\tdecode: {:.5}",
                            tag, epoch, step, total_loss, class_loss, box_loss, decode_loss
                        );
                    }
                }
            }

            self.log_file.flush().await?;
            Ok(())
        }

        async fn log_phase_metrics(&mut self, msg: PhaseMetricsLog) -> Result<()> {
            let PhaseMetricsLog {
                epoch,
                phase,
                metrics,
            } = msg;

            for (name, &value) in &metrics {
                let line = format_metric(epoch, phase, name, value);
                self.log_file.write_all(line.as_bytes()).await?;
                self.log_file.write_all(b"\n").await?;

                // per-class metrics go to the log file only
                if !name.starts_with("class") {
                    info!("{}", line);
                }
            }
            self.log_file.flush().await?;
            Ok(())
        }
    }

    /// Spawns the logging worker and returns its join future.
    pub async fn logging_worker(
        config: Arc<Config>,
        logging_dir: Arc<Path>,
        rx: broadcast::Receiver<LoggingMessage>,
    ) -> Result<impl Future<Output = Result<()>> + Send> {
        let worker = LoggingWorker::new(config, logging_dir, rx).await?;
        Ok(tokio::task::spawn(worker.start()).map(|result| Fallible::Ok(result??)))
    }

    /// The line written to the log file for one metric.
    pub fn format_metric(epoch: usize, phase: Phase, name: &str, value: f64) -> String {
        format!("Epoch {}, Phase {}, {}: {}", epoch, phase, name, value)
    }
}

mod logging_message {
    use super::*;

    /// The message type that is accepted by the logging worker.
    #[derive(Debug, Clone)]
    pub struct LoggingMessage {
        pub tag: Cow<'static, str>,
        pub kind: LoggingMessageKind,
    }

    impl LoggingMessage {
        pub fn new_phase_metrics<S>(tag: S, msg: PhaseMetricsLog) -> Self
        where
            S: Into<Cow<'static, str>>,
        {
            Self {
                tag: tag.into(),
                kind: LoggingMessageKind::PhaseMetrics(msg),
            }
        }

        pub fn new_training_step<S>(tag: S, msg: TrainingStepLog) -> Self
        where
            S: Into<Cow<'static, str>>,
        {
            Self {
                tag: tag.into(),
                kind: LoggingMessageKind::TrainingStep(msg),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub enum LoggingMessageKind {
        PhaseMetrics(PhaseMetricsLog),
        TrainingStep(TrainingStepLog),
    }

    /// The flat metric mapping of one phase of an epoch.
    #[derive(Debug, Clone)]
    pub struct PhaseMetricsLog {
        pub epoch: usize,
        pub phase: Phase,
        pub metrics: IndexMap<String, f64>,
    }

    /// The losses of one optimization step.
    #[derive(Debug, Clone)]
    pub struct TrainingStepLog {
        pub epoch: usize,
        pub step: usize,
        pub total_loss: f64,
        pub class_loss: f64,
        pub box_loss: f64,
        pub decode_loss: f64,
    }

    impl TrainingStepLog {
        pub fn new(epoch: usize, step: usize, losses: &PixorLossOutput) -> Self {
            Self {
                epoch,
                step,
                total_loss: f64::from(&losses.total_loss),
                class_loss: f64::from(&losses.class_loss),
                box_loss: f64::from(&losses.box_loss),
                decode_loss: f64::from(&losses.decode_loss),
            }
        }
    }
}
