pub mod coordinator;
pub mod harvest;
pub mod probe;
pub mod scheduler;
pub mod tester;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::Coordinator;
pub use harvest::Harvester;
pub use probe::HttpProbe;
pub use scheduler::{Scheduler, Shutdown};
pub use tester::EndpointTester;
