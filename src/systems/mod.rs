pub mod alerts;
pub mod crop;
pub mod signal;
pub mod valuation;
pub mod weather;

pub use alerts::{Alert, AlertEngine};
pub use crop::CropModel;
pub use signal::{LinkTelemetry, SignalInference, SignalReading};
pub use valuation::Valuation;
pub use weather::{WeatherCell, WeatherField};
