use crate::types::Vector3;

/// A magnetic field sampled during stage evaluation.
///
/// Implementations must be pure with respect to `sample`: many tracks may
/// query a shared field concurrently, hence the `Sync` bound.
pub trait MagneticField: Sync {
    /// The field vector at a global position, in GeV / (e · mm).
    fn sample(&self, position: &Vector3) -> Vector3;
}

/// A homogeneous field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantField {
    field: Vector3,
}

impl ConstantField {
    #[must_use]
    pub fn new(field: Vector3) -> Self {
        Self { field }
    }
}

impl MagneticField for ConstantField {
    fn sample(&self, _position: &Vector3) -> Vector3 {
        self.field
    }
}

/// The absence of a field; charged tracks move on straight lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullField;

impl MagneticField for NullField {
    fn sample(&self, _position: &Vector3) -> Vector3 {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_field_ignores_position() {
        let field = ConstantField::new(Vector3::new(1.0, 2.5, 33.33));
        assert_eq!(
            field.sample(&Vector3::new(1.0, 2.0, 3.0)),
            Vector3::new(1.0, 2.5, 33.33)
        );
    }

    #[test]
    fn null_field_is_zero() {
        assert_eq!(NullField.sample(&Vector3::new(4.0, 5.0, 6.0)), Vector3::zeros());
    }
}
