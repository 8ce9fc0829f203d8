//! Test doubles for the pipeline's collaborators.
//!
//! Enabled by the `test-utils` feature.

use crate::error::GatewayError;
use crate::gateway::{
    GatewayFuture, PaymentDetails, PaymentGateway, PaymentLink, PaymentLinkRequest, RefundReceipt,
};
use crate::notifications::{Notifier, NotifyResult, ReminderIntent, ReminderQueue};
use crate::reconciliation::{signature, RedirectParams};
use crate::tickets::Ticket;
use crate::types::{Money, SiteNotification};
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct GatewayState {
    links: Vec<PaymentLinkRequest>,
    link_failures: VecDeque<GatewayError>,
    refunds: Vec<(String, Money)>,
    refund_failures: VecDeque<GatewayError>,
    fetches: Vec<String>,
    method: Option<String>,
    delay: Option<Duration>,
}

/// Scriptable in-process payment gateway.
///
/// Succeeds by default, numbering links `plink_1`, `plink_2`, ... Failures
/// are queued per call type and consumed in order.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockPaymentGateway {
    /// Creates a new mock gateway that reports payments as `upi`
    #[must_use]
    pub fn new() -> Self {
        let gateway = Self::default();
        guard(&gateway.state).method = Some("upi".to_string());
        gateway
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(&self) -> Arc<dyn PaymentGateway> {
        Arc::new(self.clone())
    }

    /// Fail the next payment-link request with `error`
    pub fn fail_next_link(&self, error: GatewayError) {
        guard(&self.state).link_failures.push_back(error);
    }

    /// Fail the next refund request with `error`
    pub fn fail_next_refund(&self, error: GatewayError) {
        guard(&self.state).refund_failures.push_back(error);
    }

    /// Delay every call (to exercise timeouts)
    pub fn set_delay(&self, delay: Duration) {
        guard(&self.state).delay = Some(delay);
    }

    /// Payment method reported by `fetch_payment`
    pub fn set_method(&self, method: Option<&str>) {
        guard(&self.state).method = method.map(str::to_string);
    }

    /// Every payment-link request received, including failed ones
    #[must_use]
    pub fn link_requests(&self) -> Vec<PaymentLinkRequest> {
        guard(&self.state).links.clone()
    }

    /// Every successful refund: payment id and amount
    #[must_use]
    pub fn refunds(&self) -> Vec<(String, Money)> {
        guard(&self.state).refunds.clone()
    }

    /// Payment ids looked up
    #[must_use]
    pub fn fetches(&self) -> Vec<String> {
        guard(&self.state).fetches.clone()
    }

    fn delay(&self) -> Option<Duration> {
        guard(&self.state).delay
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_payment_link(&self, request: PaymentLinkRequest) -> GatewayFuture<PaymentLink> {
        let delay = self.delay();
        let result = {
            let mut state = guard(&self.state);
            state.links.push(request);
            match state.link_failures.pop_front() {
                Some(error) => Err(error),
                None => {
                    let n = state.links.len();
                    Ok(PaymentLink {
                        id: format!("plink_{n}"),
                        short_url: format!("https://rzp.io/i/mock{n}"),
                    })
                }
            }
        };
        Box::pin(async move {
            pause(delay).await;
            result
        })
    }

    fn fetch_payment(&self, payment_id: &str) -> GatewayFuture<PaymentDetails> {
        let delay = self.delay();
        let details = {
            let mut state = guard(&self.state);
            state.fetches.push(payment_id.to_string());
            PaymentDetails {
                id: payment_id.to_string(),
                method: state.method.clone(),
                status: "captured".to_string(),
            }
        };
        Box::pin(async move {
            pause(delay).await;
            Ok(details)
        })
    }

    fn create_refund(&self, payment_id: &str, amount: Money) -> GatewayFuture<RefundReceipt> {
        let delay = self.delay();
        let result = {
            let mut state = guard(&self.state);
            match state.refund_failures.pop_front() {
                Some(error) => Err(error),
                None => {
                    state.refunds.push((payment_id.to_string(), amount));
                    Ok(RefundReceipt {
                        refund_id: format!("rfnd_{}", state.refunds.len()),
                    })
                }
            }
        };
        Box::pin(async move {
            pause(delay).await;
            result
        })
    }
}

/// Webhook body for a payment event on `link_id`.
#[must_use]
pub fn webhook_body(event: &str, link_id: &str, payment_id: &str, method: Option<&str>) -> Vec<u8> {
    let error = (event == "payment.failed").then_some("card declined");
    json!({
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "payment_link_id": link_id,
                    "method": method,
                    "error_description": error,
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// Body and signature header for a webhook signed with `webhook_secret`.
#[must_use]
pub fn signed_webhook(webhook_secret: &str, event: &str, link_id: &str, payment_id: &str) -> (Vec<u8>, String) {
    let body = webhook_body(event, link_id, payment_id, Some("upi"));
    let sig = signature::sign(webhook_secret.as_bytes(), &body);
    (body, sig)
}

/// Redirect parameters signed with `key_secret`.
#[must_use]
pub fn signed_redirect(
    key_secret: &str,
    link_id: &str,
    reference_id: &str,
    status: &str,
    payment_id: &str,
) -> RedirectParams {
    let payload = signature::redirect_payload(link_id, reference_id, status, payment_id);
    RedirectParams {
        payment_link_id: Some(link_id.to_string()),
        payment_link_reference_id: Some(reference_id.to_string()),
        payment_link_status: Some(status.to_string()),
        payment_id: Some(payment_id.to_string()),
        signature: Some(signature::sign(key_secret.as_bytes(), payload.as_bytes())),
    }
}

/// Notifier that records what it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    tickets: Arc<Mutex<Vec<Ticket>>>,
    notices: Arc<Mutex<Vec<SiteNotification>>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tickets delivered so far
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        guard(&self.tickets).clone()
    }

    /// Site notifications published so far
    #[must_use]
    pub fn notices(&self) -> Vec<SiteNotification> {
        guard(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn ticket_issued(&self, ticket: Ticket) -> BoxFuture<'static, NotifyResult> {
        guard(&self.tickets).push(ticket);
        Box::pin(async { Ok(()) })
    }

    fn site_notification(&self, notification: SiteNotification) -> BoxFuture<'static, NotifyResult> {
        guard(&self.notices).push(notification);
        Box::pin(async { Ok(()) })
    }
}

/// Reminder queue that records what it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingReminderQueue {
    queued: Arc<Mutex<Vec<ReminderIntent>>>,
}

impl RecordingReminderQueue {
    /// Creates a new recording queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders queued so far
    #[must_use]
    pub fn queued(&self) -> Vec<ReminderIntent> {
        guard(&self.queued).clone()
    }
}

impl ReminderQueue for RecordingReminderQueue {
    fn enqueue(&self, reminder: ReminderIntent) -> BoxFuture<'static, NotifyResult> {
        guard(&self.queued).push(reminder);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next_link(GatewayError::Timeout);

        let request = PaymentLinkRequest {
            amount: Money::from_paise(100),
            currency: "INR".into(),
            reference_id: "EVT-0000000001".into(),
            description: "x".into(),
            contact: "9876543210".into(),
            callback_url: "http://localhost/payments/callback".into(),
        };
        assert!(gateway.create_payment_link(request.clone()).await.is_err());
        let link = gateway.create_payment_link(request).await.unwrap();
        assert_eq!(link.id, "plink_2");
        assert_eq!(gateway.link_requests().len(), 2);
    }

    #[test]
    fn signed_helpers_verify() {
        let (body, sig) = signed_webhook("whsec", "payment.captured", "plink_1", "pay_1");
        assert!(signature::verify(b"whsec", &body, &sig).is_ok());

        let params = signed_redirect("key", "plink_1", "EVT-0000000001", "paid", "pay_1");
        let payload = signature::redirect_payload("plink_1", "EVT-0000000001", "paid", "pay_1");
        assert!(signature::verify(b"key", payload.as_bytes(), params.signature.as_deref().unwrap()).is_ok());
    }
}
