/// The sense in which a track is navigated along its path.
///
/// All signed step sizes carry this direction as their sign: a backward
/// propagation proposes negative steps and accumulates negative path length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigationDirection {
    #[default]
    Forward,
    Backward,
}

impl NavigationDirection {
    /// The scalar sign of this direction: `+1.0` forward, `-1.0` backward.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }

    /// Applies this direction's sign to an unsigned magnitude.
    #[must_use]
    pub fn signed(self, magnitude: f64) -> f64 {
        self.sign() * magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_convention() {
        assert_eq!(NavigationDirection::Forward.signed(123.0), 123.0);
        assert_eq!(NavigationDirection::Backward.signed(123.0), -123.0);
        assert_eq!(NavigationDirection::default(), NavigationDirection::Forward);
    }
}
