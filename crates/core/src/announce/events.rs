use serde::{Deserialize, Serialize};

use super::Locale;
use crate::ticket::{Ticket, TicketClass};

/// Domain events the announcement sink subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnouncementEvent {
    /// A ticket moved to `called`.
    TicketCalled {
        ticket_id: String,
        class: TicketClass,
        number: u64,
        /// Present only when the patient registered before the call.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        patient_name: Option<String>,
    },
    /// The patient of the called ticket has been registered.
    PatientReady {
        ticket_id: String,
        class: TicketClass,
        number: u64,
        patient_name: String,
    },
}

impl AnnouncementEvent {
    pub fn ticket_called(ticket: &Ticket, patient_name: Option<String>) -> Self {
        AnnouncementEvent::TicketCalled {
            ticket_id: ticket.id.clone(),
            class: ticket.class,
            number: ticket.number,
            patient_name,
        }
    }

    pub fn patient_ready(ticket: &Ticket, patient_name: impl Into<String>) -> Self {
        AnnouncementEvent::PatientReady {
            ticket_id: ticket.id.clone(),
            class: ticket.class,
            number: ticket.number,
            patient_name: patient_name.into(),
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AnnouncementEvent::TicketCalled { .. } => "ticket_called",
            AnnouncementEvent::PatientReady { .. } => "patient_ready",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            AnnouncementEvent::TicketCalled { ticket_id, .. }
            | AnnouncementEvent::PatientReady { ticket_id, .. } => ticket_id,
        }
    }

    /// Text to be spoken or shown for this event.
    pub fn render(&self, locale: Locale) -> String {
        match self {
            AnnouncementEvent::TicketCalled {
                class,
                number,
                patient_name,
                ..
            } => {
                let call = match locale {
                    Locale::PtBr => format!(
                        "Senha {} {}, compareça ao atendimento",
                        class_label(*class, locale),
                        number
                    ),
                    Locale::EnUs => format!(
                        "{} ticket {}, please proceed to the desk",
                        class_label(*class, locale),
                        number
                    ),
                };
                match patient_name {
                    Some(name) => format!("{}, {}", name, lowercase_first(&call)),
                    None => call,
                }
            }
            AnnouncementEvent::PatientReady { patient_name, .. } => match locale {
                Locale::PtBr => format!("{}, siga a linha vermelha para triagem.", patient_name),
                Locale::EnUs => format!("{}, please follow the red line to triage.", patient_name),
            },
        }
    }
}

fn class_label(class: TicketClass, locale: Locale) -> &'static str {
    match (class, locale) {
        (TicketClass::Normal, Locale::PtBr) => "Normal",
        (TicketClass::Priority, Locale::PtBr) => "Preferencial",
        (TicketClass::Normal, Locale::EnUs) => "Normal",
        (TicketClass::Priority, Locale::EnUs) => "Priority",
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
