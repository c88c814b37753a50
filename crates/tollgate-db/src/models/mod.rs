//! Persistent models for the tollgate payment proxy.

pub mod endpoint;
pub mod payment;
pub mod request_log;
pub mod secret;
pub mod tenant;

pub use endpoint::{AuthKind, CreateEndpoint, Endpoint};
pub use payment::{CreatePayment, Payment, PaymentStatus, PaymentUpdate};
pub use request_log::{CreateRequestLog, RequestLog};
pub use secret::{CreateSecret, Secret};
pub use tenant::{CreateTenant, Tenant};
