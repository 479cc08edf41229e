//! The leave engine: balance bookkeeping (ledger), submission validation
//! (eligibility), the request state machine (lifecycle), and role-based
//! authorization (policy).

pub mod eligibility;
pub mod ledger;
pub mod lifecycle;
pub mod policy;
