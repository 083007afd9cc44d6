//! Photoplethysmography pipeline: MAX30102 samples in, SpO2 and heart rate
//! out.
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | `max30102`    | Register access, configuration, FIFO decode       |
//! | `wake`        | Data-ready interrupt → worker handoff             |
//! | `window`      | Contact check and per-window sample buffer        |
//! | `estimator`   | Peak/trough detection, ratio-of-ratios, smoothing |
//! | `vitals`      | Lock-free published outputs                       |
//! | `acquisition` | The worker loop tying the above together          |

pub mod acquisition;
pub mod estimator;
pub mod max30102;
pub mod vitals;
pub mod wake;
pub mod window;

pub use acquisition::{PipelineStats, PpgPipeline};
pub use estimator::{Estimate, Estimator, EstimatorParams};
pub use max30102::{Max30102, SamplePair};
pub use vitals::Vitals;
pub use wake::{WakeSignal, WakeSource};
pub use window::{ContactState, WINDOW_CAPACITY, WindowBuffer};
