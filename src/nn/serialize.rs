//! Named parameter state for checkpointing.
//!
//! A state dict maps dotted parameter names (`conv1.weight`) to data and
//! shape; it is written to disk with [`crate::serialization::safetensors`].

use crate::autograd::Tensor;
use crate::error::{Result, TrafficError};
use crate::serialization::TensorMap;

/// State dictionary: parameter name → (data, shape).
pub type StateDict = TensorMap;

/// Collect named parameters into a state dict.
pub fn state_dict<'a, I>(named: I) -> StateDict
where
    I: IntoIterator<Item = (String, &'a Tensor)>,
{
    named
        .into_iter()
        .map(|(name, t)| (name, (t.data().to_vec(), t.shape().to_vec())))
        .collect()
}

/// Copy values from `state` into the named parameters, in place.
///
/// Parameter identities are preserved, so an optimizer built before the
/// load keeps tracking the same tensors.
///
/// # Errors
///
/// Returns [`TrafficError::Checkpoint`] if a parameter is missing and
/// [`TrafficError::DimensionMismatch`] if a shape differs.
pub fn load_state_dict_into<'a, I>(named: I, state: &StateDict) -> Result<()>
where
    I: IntoIterator<Item = (String, &'a mut Tensor)>,
{
    for (name, param) in named {
        let (data, shape) = state
            .get(&name)
            .ok_or_else(|| TrafficError::Checkpoint(format!("missing parameter '{name}'")))?;

        if param.shape() != shape.as_slice() {
            return Err(TrafficError::DimensionMismatch {
                expected: format!("{name} {:?}", param.shape()),
                actual: format!("{shape:?}"),
            });
        }

        param.data_mut().copy_from_slice(data);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dict_roundtrip_preserves_identity() {
        let a = Tensor::new(&[1.0, 2.0], &[2]).requires_grad();
        let state = state_dict([("a".to_string(), &a)]);

        let mut b = Tensor::zeros(&[2]).requires_grad();
        let b_id = b.id();
        load_state_dict_into([("a".to_string(), &mut b)], &state).expect("load");

        assert_eq!(b.data(), &[1.0, 2.0]);
        assert_eq!(b.id(), b_id);
    }

    #[test]
    fn test_missing_parameter() {
        let mut t = Tensor::zeros(&[1]);
        let err = load_state_dict_into([("w".to_string(), &mut t)], &StateDict::new())
            .expect_err("missing");
        assert!(matches!(err, TrafficError::Checkpoint(_)));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut state = StateDict::new();
        state.insert("w".into(), (vec![1.0, 2.0, 3.0], vec![3]));
        let mut t = Tensor::zeros(&[2]);
        let err = load_state_dict_into([("w".to_string(), &mut t)], &state).expect_err("shape");
        assert!(matches!(err, TrafficError::DimensionMismatch { .. }));
    }
}
