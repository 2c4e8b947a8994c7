pub mod card;
pub mod error;
pub mod redirect;

pub use card::{
    CardGateway, ChargeMetadata, ChargeRequest, GatewayBalanceTransaction, GatewayCharge,
    GatewayCustomer, GatewayPlan, GatewaySubscription, SubscribeRequest,
};
pub use error::{ProcessorError, ProcessorResult};
pub use redirect::{
    AgreementRequest, ApprovalResource, ExecutedPayment, PaymentRequest, RedirectGateway,
};
