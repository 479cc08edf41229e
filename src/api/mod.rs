pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod team;
pub mod user;
