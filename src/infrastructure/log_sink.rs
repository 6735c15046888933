//! Collaborators that only log what they would deliver.
//!
//! The binary wires these in place of a websocket hub and a mail relay, which
//! live outside this service.

use crate::domain::booking::Booking;
use crate::domain::order::Order;
use crate::domain::ports::{Mailer, RealtimePublisher};
use crate::domain::transaction::SettlementTransaction;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl RealtimePublisher for LogPublisher {
    async fn publish_to_channel(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        info!(channel, event, %payload, "publish");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        transaction: &SettlementTransaction,
    ) -> Result<()> {
        info!(
            booking_number = %booking.booking_number,
            customer_id = %booking.customer_id,
            amount = %transaction.amount,
            "booking confirmation mail queued"
        );
        Ok(())
    }

    async fn send_order_confirmation(
        &self,
        order: &Order,
        transaction: &SettlementTransaction,
    ) -> Result<()> {
        info!(
            order_number = %order.order_number,
            customer_id = %order.customer_id,
            amount = %transaction.amount,
            "order confirmation mail queued"
        );
        Ok(())
    }
}
