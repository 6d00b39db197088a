//! Ledgerly Billing Core - Subscription activation engine
//!
//! Signature verification, term window computation, the subscription state
//! machine, gateway webhook dispatch and the Razorpay subscriptions client.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ledgerly_billing_core::{BillingConfig, BillingService, RazorpayProvider, SystemClock};
//! use ledgerly_db::Repositories;
//!
//! let config = BillingConfig::new("rzp_live_...", "key_secret", "confirm_secret", "webhook_secret");
//! let repos = Repositories::new(pool);
//!
//! let billing = BillingService::new(
//!     &config,
//!     Arc::new(repos.accounts),
//!     Arc::new(repos.plans),
//!     Arc::new(RazorpayProvider::new(config.clone())),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let outcome = billing.process_webhook(&body, &signature).await?;
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod provider;
pub mod razorpay;
pub mod schedule;
pub mod service;
pub mod webhook;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BillingConfig;
pub use crypto::{confirmation_payload, SigningKey};
pub use engine::{PaymentConfirmation, SnapshotUpdate, SubscriptionEngine};
pub use error::BillingError;
pub use provider::{GatewaySubscription, PaymentProvider};
pub use razorpay::RazorpayProvider;
pub use schedule::{compute_window, TermWindow};
pub use service::{AccountSubscription, BillingService, CheckoutSession, WebhookOutcome};
pub use webhook::{WebhookEvent, WebhookHandler};
