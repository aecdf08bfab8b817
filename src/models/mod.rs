pub mod actuation;
pub mod prediction;
pub mod sensor;
pub mod status;

// Re-export core models for easy access
pub use actuation::{ActuationEvent, TriggerSource};
pub use prediction::{Decision, Prediction, PredictionMethod};
pub use sensor::{DeviceBuffer, SensorField, SensorRecord};
pub use status::{TankState, WateringState};
