use crate::{common::*, config::LoadCheckpoint};

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// The checkpoint path of a model in a run directory.
pub fn checkpoint_path(checkpoint_dir: &Path, model_name: &str) -> PathBuf {
    checkpoint_dir.join(format!("{}.ckpt", model_name))
}

/// Save parameters to the checkpoint file, replacing the previous one.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    model_name: &str,
    loss: f64,
) -> Result<PathBuf> {
    let path = checkpoint_path(checkpoint_dir, model_name);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint '{}'", path.display()))?;
    info!("saved checkpoint '{}' with loss {:.5}", path.display(), loss);
    Ok(path)
}

/// Finds the checkpoint of the most recent run under the logging directory.
///
/// Runs are ordered by the timestamp in their directory names. Directories
/// whose names are not timestamps are ignored.
pub fn find_recent_checkpoint(logging_dir: &Path, model_name: &str) -> Result<Option<PathBuf>> {
    let pattern = format!(
        "{}/*/{}/{}.ckpt",
        glob::Pattern::escape(&logging_dir.display().to_string()),
        CHECKPOINT_DIR,
        glob::Pattern::escape(model_name)
    );
    let paths: Vec<PathBuf> = glob::glob(&pattern)?.collect::<Result<_, _>>()?;

    let recent = paths
        .into_iter()
        .filter_map(|path| {
            let run_name = path.parent()?.parent()?.file_name()?.to_str()?;
            let datetime = DateTime::parse_from_str(run_name, FILE_STRFTIME).ok()?;
            Some((path, datetime))
        })
        .max_by_key(|(_path, datetime)| *datetime)
        .map(|(path, _datetime)| path);
    Ok(recent)
}

/// Load parameters with specified checkpoint loading method.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    logging_dir: &Path,
    model_name: &str,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<PathBuf>> {
    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromRecent => {
            let path = find_recent_checkpoint(logging_dir, model_name)?;
            if path.is_none() {
                warn!("no checkpoint file found");
            }
            path
        }
        LoadCheckpoint::FromFile { file } => {
            ensure!(file.is_file(), "'{}' is not a file", file.display());
            Some(file.to_owned())
        }
    };

    if let Some(path) = &path {
        info!("load checkpoint file '{}'", path.display());
        vs.load(path)
            .with_context(|| format!("failed to load checkpoint '{}'", path.display()))?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dir(logging_dir: &Path, rfc3339: &str) -> Result<PathBuf> {
        let datetime = DateTime::parse_from_rfc3339(rfc3339)?;
        let dir = logging_dir
            .join(datetime.format(FILE_STRFTIME).to_string())
            .join(CHECKPOINT_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    #[test]
    fn recent_checkpoint_by_run_time() -> Result<()> {
        let logging_dir = tempfile::tempdir()?;
        let logging_dir = logging_dir.path();
        assert_eq!(find_recent_checkpoint(logging_dir, "pixor")?, None);

        let vs = nn::VarStore::new(Device::Cpu);
        let _ = vs.root().zeros("weight", &[2]);

        let older = run_dir(logging_dir, "2022-03-01T10:00:00+00:00")?;
        let newer = run_dir(logging_dir, "2022-03-02T09:00:00+00:00")?;
        let other_model = run_dir(logging_dir, "2022-03-03T09:00:00+00:00")?;
        save_checkpoint(&vs, &older, "pixor", 1.0)?;
        let expect = save_checkpoint(&vs, &newer, "pixor", 0.5)?;
        save_checkpoint(&vs, &other_model, "other", 0.1)?;

        // not a run directory
        let stray = logging_dir.join("scratch").join(CHECKPOINT_DIR);
        std::fs::create_dir_all(&stray)?;
        save_checkpoint(&vs, &stray, "pixor", 0.1)?;

        assert_eq!(find_recent_checkpoint(logging_dir, "pixor")?, Some(expect));
        Ok(())
    }

    #[test]
    fn load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let saved = {
            let vs = nn::VarStore::new(Device::Cpu);
            let weight = vs.root().zeros("weight", &[3]);
            tch::no_grad(|| {
                let _ = weight.shallow_clone().fill_(2.0);
            });
            save_checkpoint(&vs, dir.path(), "pixor", 0.0)?
        };

        let mut vs = nn::VarStore::new(Device::Cpu);
        let weight = vs.root().zeros("weight", &[3]);
        let loaded = try_load_checkpoint(
            &mut vs,
            dir.path(),
            "pixor",
            &LoadCheckpoint::FromFile {
                file: saved.clone(),
            },
        )?;
        assert_eq!(loaded, Some(saved));
        assert_eq!(Vec::<f32>::from(&weight), vec![2.0; 3]);

        let missing = LoadCheckpoint::FromFile {
            file: dir.path().join("missing.ckpt"),
        };
        assert!(try_load_checkpoint(&mut vs, dir.path(), "pixor", &missing).is_err());
        Ok(())
    }
}
