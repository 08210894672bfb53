pub mod evaluation;
pub mod readings;
pub mod watering;
pub mod zone;

pub use evaluation::*;
pub use readings::*;
pub use watering::*;
pub use zone::*;
