//! Data preprocessing module
//!
//! Fitted transforms for the survey pipeline:
//! - Categorical label encoding with sorted vocabularies
//! - Target label encoding
//! - Z-score standardization of numeric columns
//! - Training and inference preparers that chain the transforms in a fixed
//!   order and freeze the feature layout

mod encoder;
mod preparer;
mod scaler;
mod target;

pub use encoder::CategoryEncoder;
pub use preparer::{InferencePreparer, PreparedTraining, TrainingPreparer};
pub use scaler::{ColumnStats, StandardScaler};
pub use target::TargetEncoder;
