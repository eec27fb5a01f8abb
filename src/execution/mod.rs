pub mod action_executor;
pub mod funding;
pub mod gas;
pub mod retry;
pub mod sampler;
pub mod scheduler;
pub mod state_store;
pub mod submission;

pub use action_executor::ActionExecutor;
pub use funding::{FundingOutcome, FundingPlanner, TRANSFER_GAS};
pub use gas::GasEstimator;
pub use retry::RetryPolicy;
pub use sampler::{ActionSampler, ActionTemplate, StakeBounds};
pub use scheduler::{RotationScheduler, SchedulerConfig};
pub use state_store::RotationStore;
