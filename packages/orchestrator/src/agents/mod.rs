//! Built-in domain agents.
//!
//! Each agent implements [`crate::agent::ActionHandler`] with simulated
//! business results; real deployments swap these for connectors to actual
//! systems of record.

pub mod finance;
pub mod hr;
pub mod it;
pub mod legal;
pub mod operations;
pub mod procurement;

pub use finance::FinanceAgent;
pub use hr::HrAgent;
pub use it::ItAgent;
pub use legal::LegalAgent;
pub use operations::OperationsAgent;
pub use procurement::ProcurementAgent;

use crate::agent::ActionHandler;

/// One instance of every built-in domain agent.
pub fn default_handlers() -> Vec<Box<dyn ActionHandler>> {
    vec![
        Box::new(FinanceAgent::new()),
        Box::new(LegalAgent::new()),
        Box::new(ItAgent::new()),
        Box::new(HrAgent::new()),
        Box::new(ProcurementAgent::new()),
        Box::new(OperationsAgent::new()),
    ]
}
