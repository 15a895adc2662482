pub mod balance;
pub mod bundle;
pub mod explain;
pub mod forest;
pub mod labels;
pub mod loader;
pub mod metrics;
pub mod split;
pub mod trainer;
pub mod transform;

pub use bundle::{ModelBundle, BUNDLE_SCHEMA_VERSION};
pub use explain::FeatureImportance;
pub use forest::{ForestParams, RiskForest};
pub use labels::{LabelRules, SupportRule};
pub use metrics::{ClassMetrics, MetricReport};
pub use trainer::{train_both, train_target, TrainingOptions};
pub use transform::{FeatureMatrix, FittedTransformerState};
