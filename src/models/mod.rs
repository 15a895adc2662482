pub mod student;

pub use student::{
    DerivedLabels, Gender, PredictionRecord, RawFeatures, RiskBand, RiskTarget, StudentRecord,
    TargetPrediction,
};
