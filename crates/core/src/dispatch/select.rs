use crate::ticket::{Ticket, TicketClass, TicketStatus};

/// Waiting tickets in the order call-next would take them.
///
/// All priority tickets come first, then normal ones; within a class the
/// order is `(created_at, seq)`. Ticket numbers are never compared.
pub fn dispatch_order(tickets: &[Ticket]) -> Vec<&Ticket> {
    let mut waiting: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Waiting)
        .collect();
    waiting.sort_by_key(|t| (t.class != TicketClass::Priority, t.order_key()));
    waiting
}

/// The ticket call-next should call, or `None` if nothing is waiting.
pub fn select_next(tickets: &[Ticket]) -> Option<&Ticket> {
    dispatch_order(tickets).into_iter().next()
}
