pub mod batch;
pub mod delivery;
pub mod event;
pub mod geo;
pub mod ledger;
pub mod payment;
pub mod user;
