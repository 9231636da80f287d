//! In-memory representation of labelled time series datasets.

pub mod instance;
pub mod instances;
pub mod series;

pub use instance::TimeSeriesInstance;
pub use instances::TimeSeriesInstances;
pub use series::TimeSeries;
