pub mod breaker;
pub mod layer;
pub mod registry;
pub mod types;

pub use breaker::CircuitBreaker;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use registry::CircuitBreakerRegistry;
pub use types::{BreakerStatus, CircuitBreakerConfig, CircuitState};
