// src/scheduling.rs
// Núcleo de agenda: funções puras, sem banco e sem relógio próprio.
pub mod calendar_rules;
pub mod policy;
pub mod slots;

pub use calendar_rules::{CalendarRules, LocalDay, MinuteRange};
pub use slots::{SlotRequest, format_minute, generate_slots, is_bookable};
