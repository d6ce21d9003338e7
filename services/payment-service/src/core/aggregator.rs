// /flight-booking/services/payment-service/src/core/aggregator.rs

use bigdecimal::{BigDecimal, Zero};
use crate::models::{BookingPaymentStatus, Ticket, TicketStatus};

/// Hitung rollup status pembayaran dari semua ticket di satu confirmation code.
///
/// Ticket CANCELLED tidak dihitung sama sekali, baik di count maupun amount.
/// List kosong menghasilkan status "tidak perlu bayar" sekaligus "belum lunas".
pub fn aggregate(confirmation_code: &str, tickets: &[Ticket]) -> BookingPaymentStatus {
    let mut paid_tickets = 0usize;
    let mut unpaid_tickets = 0usize;
    let mut paid_amount = BigDecimal::zero();
    let mut unpaid_amount = BigDecimal::zero();

    for ticket in tickets {
        match ticket.status {
            TicketStatus::Paid => {
                paid_tickets += 1;
                paid_amount += &ticket.fare;
            }
            TicketStatus::Unpaid => {
                unpaid_tickets += 1;
                unpaid_amount += &ticket.fare;
            }
            TicketStatus::Cancelled => {}
        }
    }

    let total_tickets = paid_tickets + unpaid_tickets;
    let total_amount = &paid_amount + &unpaid_amount;

    BookingPaymentStatus {
        confirmation_code: confirmation_code.to_string(),
        total_tickets,
        paid_tickets,
        unpaid_tickets,
        total_amount,
        paid_amount,
        unpaid_amount,
        booking_paid: unpaid_tickets == 0 && total_tickets > 0,
        partially_paid: paid_tickets > 0 && paid_tickets < total_tickets,
        payment_required: unpaid_tickets > 0,
    }
}
