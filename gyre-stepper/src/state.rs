use gyre_core::{
    ConstrainedStep, NavigationDirection, PlaneSurface,
    types::{BoundMatrix, BoundToFreeMatrix, FreeMatrix, FreeVector, Vector3, free},
};

/// The mutable state of one in-flight track propagation.
///
/// Holds the kinematic state, the step-size bookkeeping, and the running
/// linearization used for covariance transport. Exactly one logical thread
/// of control mutates a `TrackState` at a time; branching a trajectory
/// means cloning the state at the branch point.
///
/// The Jacobian bookkeeping follows one invariant: `jac_transport` maps a
/// free-parameter perturbation at the last frame rebase to the current
/// point, and is reset to identity (with `derivative` zeroed) exactly when
/// the state is rebased — at construction, on [`reset`](Self::reset), and
/// by a covariance transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    pub position: Vector3,
    /// Unit direction of flight.
    pub direction: Vector3,
    /// Momentum magnitude in GeV, non-negative.
    pub momentum: f64,
    /// Charge in elementary charges.
    pub charge: f64,
    pub time: f64,
    pub navigation_direction: NavigationDirection,
    /// Signed path length accumulated since the last rebase.
    pub path_accumulated: f64,
    /// The constrained proposal for the next step.
    pub step_size: ConstrainedStep,
    /// The last accepted step, seeding the next trial.
    pub previous_step_size: f64,
    /// Local error tolerance for step acceptance.
    pub tolerance: f64,
    /// Whether a covariance is carried and transported.
    pub cov_transport: bool,
    /// Bound-frame covariance; zero when `cov_transport` is off.
    pub covariance: BoundMatrix,
    /// Bound-to-free Jacobian fixed at the last rebase; zero without
    /// covariance.
    pub jac_to_global: BoundToFreeMatrix,
    /// Free-frame transport Jacobian since the last rebase.
    pub jac_transport: FreeMatrix,
    /// Accumulated bound-frame Jacobian since the last bound/curvilinear
    /// state was materialized.
    pub jacobian: BoundMatrix,
    /// d(free parameters)/d(path length) at the last accepted stage.
    pub derivative: FreeVector,
}

impl TrackState {
    /// Creates a state at the given kinematics.
    ///
    /// With a covariance, the bound frame is the curvilinear frame of
    /// `direction` and covariance transport is enabled; without one,
    /// `jac_to_global` stays zero and transport is a no-op.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position: Vector3,
        direction: Vector3,
        momentum: f64,
        charge: f64,
        time: f64,
        covariance: Option<BoundMatrix>,
        navigation_direction: NavigationDirection,
        step_size: f64,
        tolerance: f64,
    ) -> Self {
        let direction = direction.normalize();
        let (cov_transport, covariance_matrix, jac_to_global) = match covariance {
            Some(cov) => {
                let frame = PlaneSurface::curvilinear(position, direction);
                (true, cov, frame.bound_to_free_jacobian(&direction))
            }
            None => (false, BoundMatrix::zeros(), BoundToFreeMatrix::zeros()),
        };

        Self {
            position,
            direction,
            momentum,
            charge,
            time,
            navigation_direction,
            path_accumulated: 0.0,
            step_size: ConstrainedStep::new(navigation_direction.signed(step_size)),
            previous_step_size: 0.0,
            tolerance,
            cov_transport,
            covariance: covariance_matrix,
            jac_to_global,
            jac_transport: FreeMatrix::identity(),
            jacobian: BoundMatrix::identity(),
            derivative: FreeVector::zeros(),
        }
    }

    /// Rebases the state onto a new reference surface with forward
    /// navigation and an unconstrained step size.
    pub fn reset(
        &mut self,
        parameters: &FreeVector,
        covariance: BoundMatrix,
        surface: &PlaneSurface,
    ) {
        self.reset_with(
            parameters,
            covariance,
            surface,
            NavigationDirection::Forward,
            f64::MAX,
        );
    }

    /// Rebases the state onto a new reference surface.
    ///
    /// Kinematics come from `parameters`; charge, tolerance, and the
    /// previous step size are carried over from the existing state. The
    /// transport Jacobian returns to identity, the derivative to zero, and
    /// the accumulated path restarts at zero.
    pub fn reset_with(
        &mut self,
        parameters: &FreeVector,
        covariance: BoundMatrix,
        surface: &PlaneSurface,
        navigation_direction: NavigationDirection,
        step_size: f64,
    ) {
        self.assign_free(parameters);
        self.navigation_direction = navigation_direction;
        self.path_accumulated = 0.0;
        self.step_size = ConstrainedStep::new(navigation_direction.signed(step_size));

        self.cov_transport = true;
        self.covariance = covariance;
        self.jac_to_global = surface.bound_to_free_jacobian(&self.direction);
        self.jac_transport = FreeMatrix::identity();
        self.jacobian = BoundMatrix::identity();
        self.derivative = FreeVector::zeros();
    }

    /// Overwrites the kinematic state from free parameters, leaving the
    /// charge hypothesis alone.
    ///
    /// With `Some` covariance the carried matrix is replaced; a state that
    /// was not transporting one starts to, bound to the curvilinear frame
    /// of the new direction. With `None` the covariance bookkeeping is
    /// untouched.
    pub fn update_free(&mut self, parameters: &FreeVector, covariance: Option<BoundMatrix>) {
        self.assign_free(parameters);
        if let Some(cov) = covariance {
            if !self.cov_transport {
                let frame = PlaneSurface::curvilinear(self.position, self.direction);
                self.jac_to_global = frame.bound_to_free_jacobian(&self.direction);
                self.cov_transport = true;
            }
            self.covariance = cov;
        }
    }

    /// Overwrites the kinematic state piecewise.
    pub fn update_parts(
        &mut self,
        position: Vector3,
        direction: Vector3,
        momentum: f64,
        time: f64,
    ) {
        self.position = position;
        self.direction = direction.normalize();
        self.momentum = momentum;
        self.time = time;
    }

    /// The free q/p component: charge over momentum, or 1/p for neutrals.
    #[must_use]
    pub fn qop(&self) -> f64 {
        if self.charge == 0.0 {
            1.0 / self.momentum
        } else {
            self.charge / self.momentum
        }
    }

    /// The current state as a free-parameter vector.
    #[must_use]
    pub fn free_parameters(&self) -> FreeVector {
        let mut f = FreeVector::zeros();
        f[free::X] = self.position.x;
        f[free::Y] = self.position.y;
        f[free::Z] = self.position.z;
        f[free::T] = self.time;
        f[free::DX] = self.direction.x;
        f[free::DY] = self.direction.y;
        f[free::DZ] = self.direction.z;
        f[free::QOP] = self.qop();
        f
    }

    fn assign_free(&mut self, parameters: &FreeVector) {
        self.position = Vector3::new(
            parameters[free::X],
            parameters[free::Y],
            parameters[free::Z],
        );
        self.direction = Vector3::new(
            parameters[free::DX],
            parameters[free::DY],
            parameters[free::DZ],
        )
        .normalize();
        self.momentum = (1.0 / parameters[free::QOP]).abs();
        self.time = parameters[free::T];
    }
}
