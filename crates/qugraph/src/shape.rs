//! Shape and duration algebra shared by the operation factories.
//!
//! Shapes follow NumPy broadcasting rules; durations are validated as
//! strictly positive finite segment lengths. All helpers are pure and
//! report failures through [`GraphError`](crate::error::GraphError).

use smallvec::SmallVec;

use crate::error::{ensure, ErrorCode, GraphError, GraphResult};

/// Dimension vector. Most value shapes are rank ≤ 4.
pub type Dims = SmallVec<[usize; 4]>;

pub fn dims(slice: &[usize]) -> Dims {
    SmallVec::from_slice(slice)
}

/// Renders a shape the way the error messages quote it, e.g. `(2, 3)`.
pub fn format_dims(shape: &[usize]) -> String {
    let inner = shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if shape.len() == 1 {
        format!("({inner},)")
    } else {
        format!("({inner})")
    }
}

/// NumPy-style broadcast of two shapes. `None` when incompatible.
pub fn broadcast(a: &[usize], b: &[usize]) -> Option<Dims> {
    let rank = a.len().max(b.len());
    let mut out = Dims::with_capacity(rank);
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        if da == db || db == 1 {
            out.push(da);
        } else if da == 1 {
            out.push(db);
        } else {
            return None;
        }
    }
    Some(out)
}

pub fn broadcast_all<'a>(shapes: impl IntoIterator<Item = &'a [usize]>) -> Option<Dims> {
    let mut out = Dims::new();
    for shape in shapes {
        out = broadcast(&out, shape)?;
    }
    Some(out)
}

pub fn validate_broadcast(
    a: &[usize],
    b: &[usize],
    a_name: &str,
    b_name: &str,
) -> GraphResult<Dims> {
    broadcast(a, b).ok_or_else(|| {
        GraphError::new(
            ErrorCode::NonBroadcastable,
            format!(
                "the shapes {} of {a_name} and {} of {b_name} must be broadcastable",
                format_dims(a),
                format_dims(b)
            ),
        )
    })
}

/// Normalises a possibly negative axis against `rank`.
pub fn normalize_axis(axis: i64, rank: usize, name: &str) -> GraphResult<usize> {
    let rank = rank as i64;
    ensure!(
        -rank <= axis && axis < rank,
        ErrorCode::InvalidAxis,
        "axis {axis} is out of range for {name} of rank {rank}"
    );
    Ok(if axis < 0 { (axis + rank) as usize } else { axis as usize })
}

/// Normalises an axis list: negative values wrapped, duplicates rejected.
/// `None` selects every axis.
pub fn normalize_axes(axes: Option<&[i64]>, rank: usize, name: &str) -> GraphResult<Vec<usize>> {
    let Some(axes) = axes else {
        return Ok((0..rank).collect());
    };
    let mut normalized = Vec::with_capacity(axes.len());
    for &axis in axes {
        let axis = normalize_axis(axis, rank, name)?;
        ensure!(
            !normalized.contains(&axis),
            ErrorCode::InvalidAxis,
            "elements of axis must refer to unique dimensions of {name}"
        );
        normalized.push(axis);
    }
    Ok(normalized)
}

/// Shape after reducing `axes`, keeping length-1 dims when `keepdims`.
pub fn reduced_shape(shape: &[usize], axes: &[usize], keepdims: bool) -> Dims {
    let mut out = Dims::new();
    for (i, &size) in shape.iter().enumerate() {
        if !axes.contains(&i) {
            out.push(size);
        } else if keepdims {
            out.push(1);
        }
    }
    out
}

/// Value shape of `matmul` including broadcast batch dims.
pub fn matmul_value_shape(
    x: &[usize],
    y: &[usize],
    x_name: &str,
    y_name: &str,
) -> GraphResult<Dims> {
    ensure!(
        x.len() >= 2 && y.len() >= 2,
        ErrorCode::ShapeMismatch,
        "the shapes {} of {x_name} and {} of {y_name} must have at least two dimensions",
        format_dims(x),
        format_dims(y)
    );
    ensure!(
        x[x.len() - 1] == y[y.len() - 2],
        ErrorCode::ShapeMismatch,
        "the last dimension of {x_name} (shape {}) must equal the second-to-last dimension of {y_name} (shape {})",
        format_dims(x),
        format_dims(y)
    );
    let mut out = validate_broadcast(
        &x[..x.len() - 2],
        &y[..y.len() - 2],
        &format!("{x_name} (batch)"),
        &format!("{y_name} (batch)"),
    )?;
    out.push(x[x.len() - 2]);
    out.push(y[y.len() - 1]);
    Ok(out)
}

/// Value shape of `kron` including broadcast batch dims.
pub fn kron_value_shape(x: &[usize], y: &[usize], x_name: &str, y_name: &str) -> GraphResult<Dims> {
    ensure!(
        x.len() >= 2 && y.len() >= 2,
        ErrorCode::ShapeMismatch,
        "the shapes {} of {x_name} and {} of {y_name} must have at least two dimensions",
        format_dims(x),
        format_dims(y)
    );
    let mut out = validate_broadcast(
        &x[..x.len() - 2],
        &y[..y.len() - 2],
        &format!("{x_name} (batch)"),
        &format!("{y_name} (batch)"),
    )?;
    out.push(x[x.len() - 2] * y[y.len() - 2]);
    out.push(x[x.len() - 1] * y[y.len() - 1]);
    Ok(out)
}

/// Absolute-plus-relative closeness, matching NumPy's default tolerances.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

pub fn check_duration(duration: f64, name: &str) -> GraphResult<()> {
    ensure!(
        duration.is_finite() && duration > 0.0,
        ErrorCode::NonPositiveDuration,
        "{name} must be a positive finite number, got {duration}"
    );
    Ok(())
}

pub fn check_durations(durations: &[f64], name: &str) -> GraphResult<()> {
    ensure!(
        !durations.is_empty(),
        ErrorCode::EmptyList,
        "{name} must contain at least one segment"
    );
    for (index, &duration) in durations.iter().enumerate() {
        check_duration(duration, &format!("{name}[{index}]"))?;
    }
    Ok(())
}

pub fn total_duration(durations: &[f64]) -> f64 {
    durations.iter().sum()
}

/// Union of the segment boundaries of several duration vectors, returned
/// as successive differences. Inputs must have matching total duration.
pub fn mesh_durations<'a>(duration_lists: impl IntoIterator<Item = &'a [f64]>) -> Vec<f64> {
    let mut boundaries = Vec::new();
    for durations in duration_lists {
        let mut elapsed = 0.0;
        for &duration in durations {
            elapsed += duration;
            boundaries.push(elapsed);
        }
    }
    boundaries.sort_by(f64::total_cmp);
    // Boundaries that differ only by float rounding are one boundary;
    // keep the larger so the meshed total covers every input.
    boundaries.dedup_by(|a, b| {
        if is_close(*a, *b) {
            *b = *a;
            true
        } else {
            false
        }
    });
    let mut previous = 0.0;
    boundaries
        .into_iter()
        .map(|boundary| {
            let segment = boundary - previous;
            previous = boundary;
            segment
        })
        .collect()
}

/// Sample times must be real, finite, and sorted in non-decreasing order.
/// Empty vectors are accepted.
pub fn check_sample_times(sample_times: &[f64], name: &str) -> GraphResult<()> {
    for &time in sample_times {
        ensure!(
            time.is_finite(),
            ErrorCode::InvalidValue,
            "{name} must contain finite values"
        );
    }
    ensure!(
        sample_times.windows(2).all(|pair| pair[0] <= pair[1]),
        ErrorCode::OutOfBounds,
        "{name} must be sorted in non-decreasing order"
    );
    Ok(())
}

/// Sample times additionally bounded by `[0, total duration]` with an
/// endpoint closeness tolerance.
pub fn check_sample_times_with_bounds(
    sample_times: &[f64],
    name: &str,
    durations: &[f64],
    owner_name: &str,
) -> GraphResult<()> {
    check_sample_times(sample_times, name)?;
    let (Some(&first), Some(&last)) = (sample_times.first(), sample_times.last()) else {
        return Ok(());
    };
    let duration = total_duration(durations);
    ensure!(
        (first >= 0.0 || is_close(first, 0.0)) && (last <= duration || is_close(last, duration)),
        ErrorCode::OutOfBounds,
        "{name} must be between 0 and the duration {duration} of {owner_name}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_follows_numpy_rules() {
        assert_eq!(broadcast(&[2, 3], &[3]).unwrap().as_slice(), &[2, 3]);
        assert_eq!(broadcast(&[4, 1, 3], &[2, 1]).unwrap().as_slice(), &[4, 2, 3]);
        assert_eq!(broadcast(&[], &[5]).unwrap().as_slice(), &[5]);
        assert!(broadcast(&[2, 3], &[4]).is_none());
    }

    #[test]
    fn axes_normalise_and_reject_duplicates() {
        assert_eq!(normalize_axes(Some(&[-1, 0]), 3, "x").unwrap(), vec![2, 0]);
        assert_eq!(normalize_axes(None, 2, "x").unwrap(), vec![0, 1]);
        let err = normalize_axes(Some(&[1, -1]), 2, "x").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAxis);
        let err = normalize_axes(Some(&[3]), 2, "x").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAxis);
    }

    #[test]
    fn reduced_shape_respects_keepdims() {
        assert_eq!(reduced_shape(&[2, 3, 4], &[1], false).as_slice(), &[2, 4]);
        assert_eq!(reduced_shape(&[2, 3, 4], &[1], true).as_slice(), &[2, 1, 4]);
        assert!(reduced_shape(&[2], &[0], false).is_empty());
    }

    #[test]
    fn matmul_shape_broadcasts_batch_dims() {
        let shape = matmul_value_shape(&[5, 1, 2, 3], &[4, 3, 7], "x", "y").unwrap();
        assert_eq!(shape.as_slice(), &[5, 4, 2, 7]);
        let err = matmul_value_shape(&[2, 3], &[2, 3], "x", "y").unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeMismatch);
    }

    #[test]
    fn meshing_merges_boundaries() {
        let meshed = mesh_durations([[0.1, 0.3].as_slice(), [0.2, 0.2].as_slice()]);
        assert_eq!(meshed.len(), 3);
        assert!((meshed[0] - 0.1).abs() < 1e-12);
        assert!((meshed[1] - 0.1).abs() < 1e-12);
        assert!((meshed[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn meshing_collapses_float_rounded_boundaries() {
        // 0.1 + 0.2 lands a rounding error away from 0.3.
        let meshed = mesh_durations([[0.1, 0.2].as_slice(), [0.3].as_slice()]);
        assert_eq!(meshed.len(), 2);
        assert!((meshed[0] - 0.1).abs() < 1e-12);
        assert!((meshed[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn meshing_is_identity_on_a_single_pwc() {
        let meshed = mesh_durations([[0.5, 0.25, 0.25].as_slice()]);
        assert_eq!(meshed.len(), 3);
        assert!((total_duration(&meshed) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sample_time_bounds_tolerate_endpoints() {
        let durations = [0.1, 0.1];
        check_sample_times_with_bounds(&[0.0, 0.2], "t", &durations, "pwc").unwrap();
        check_sample_times_with_bounds(&[], "t", &durations, "pwc").unwrap();
        check_sample_times_with_bounds(&[0.2 + 1e-12], "t", &durations, "pwc").unwrap();
        let err =
            check_sample_times_with_bounds(&[0.3], "t", &durations, "pwc").unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
        let err = check_sample_times(&[0.2, 0.1], "t").unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfBounds);
    }

    #[test]
    fn durations_must_be_positive() {
        assert!(check_durations(&[0.1, 0.2], "durations").is_ok());
        let err = check_durations(&[0.1, 0.0], "durations").unwrap_err();
        assert_eq!(err.code, ErrorCode::NonPositiveDuration);
        let err = check_durations(&[], "durations").unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyList);
    }
}
