use crate::common::*;
use ndarray_npy::{read_npy, ReadNpyError};

/// Reads a `.npy` array of any supported numeric dtype as `f64`.
pub(crate) fn read_array(path: &Path) -> Result<ArrayD<f64>> {
    macro_rules! try_read {
        ($ty:ty) => {
            match read_npy::<_, ArrayD<$ty>>(path) {
                Ok(array) => return Ok(array.mapv(|value| value as f64)),
                Err(ReadNpyError::WrongDescriptor(_)) => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("unable to read '{}'", path.display()))
                }
            }
        };
    }

    try_read!(f64);
    try_read!(f32);
    try_read!(i64);
    try_read!(i32);
    try_read!(u8);

    bail!("'{}' has an unsupported dtype", path.display())
}

/// Reads a `.npy` array of integral values, e.g. a class map.
pub(crate) fn read_integer_array(path: &Path) -> Result<ArrayD<i64>> {
    let array = read_array(path)?;
    ensure!(
        array
            .iter()
            .all(|value| value.is_finite() && value.fract() == 0.0),
        "'{}' contains non-integral values",
        path.display()
    );
    Ok(array.mapv(|value| value as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use ndarray_npy::write_npy;

    #[test]
    fn dtype_fallback() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let float_path = dir.path().join("float.npy");
        write_npy(&float_path, &arr1(&[1.5f32, -2.0]))?;
        assert_eq!(read_array(&float_path)?.into_raw_vec(), vec![1.5, -2.0]);

        let int_path = dir.path().join("int.npy");
        write_npy(&int_path, &arr2(&[[0i64, 1], [2, 0]]))?;
        let classes = read_integer_array(&int_path)?;
        assert_eq!(classes.shape(), &[2, 2]);
        assert_eq!(classes.into_raw_vec(), vec![0, 1, 2, 0]);

        assert!(read_integer_array(&float_path).is_err());
        assert!(read_array(&dir.path().join("missing.npy")).is_err());
        Ok(())
    }
}
