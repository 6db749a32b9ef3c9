mod direction;
mod field;
mod material;
mod step_size;
mod surface;

pub mod types;
pub mod units;

pub use direction::NavigationDirection;
pub use field::{ConstantField, MagneticField, NullField};
pub use material::Material;
pub use step_size::{ConstrainedStep, StepSizeSlot};
pub use surface::{PlaneSurface, curvilinear_frame};
