//! Complex survey designs and design-based estimation.

pub mod estimate;
pub mod survey;
pub mod wls;

pub use estimate::{taylor_variance, weighted_mean, weighted_variance, SurveyEstimate};
pub use survey::{SingletonMethod, SurveyDesign};
pub use wls::{fit_wls, Coefficient, FittedModel};
