// Domain value types shared by entities and services
pub mod commercial;
pub mod producer;
pub mod status;

pub use commercial::{
    CommissionType, DeliveryType, Discount, DiscountType, PaymentMethod, PriceSource, UserRole,
};
pub use producer::ProducerRef;
pub use status::{
    BudgetStatus, CommissionStatus, OrderStatus, PaymentStatus, ReceivableStatus, StatusMachine,
};
