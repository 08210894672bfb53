pub mod actuator;
pub mod controller;
pub mod watering_log;

pub use actuator::{Actuator, RelayBoard, SimulatedActuator, SysfsActuator};
pub use controller::IrrigationController;
pub use watering_log::{JsonLinesLog, WateringLog};
