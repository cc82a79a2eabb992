// Adaptive Sampling Subsystem
//
// Reservoir samplers (plain, weighted, stratified, time-windowed), running
// window statistics, the anomaly gate, and the adaptive sampler that ties
// them together with rate-based admission.

pub mod adaptive;
pub mod anomaly;
pub mod reservoir;
pub mod stratified;
pub mod window_stats;

pub use adaptive::{AdaptiveSampler, SampleDecision};
pub use anomaly::{AnomalyGate, MetricThreshold};
pub use reservoir::{Reservoir, TimeWindowReservoir, WeightedReservoir};
pub use stratified::{AllocationStrategy, StratifiedReservoir};
pub use window_stats::WindowStats;
