pub mod accounts_receivable;
pub mod budget;
pub mod budget_item;
pub mod budget_payment;
pub mod client;
pub mod commission;
pub mod margin_tier;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod pricing_settings;
pub mod product;
pub mod production_order;
pub mod production_order_item;
pub mod user;
