// src/models/availability.rs

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    /// Horário local do estabelecimento, "HH:MM".
    #[schema(example = "09:30")]
    pub time: String,
    /// Profissional que atende nesse horário (o primeiro livre quando o cliente escolheu "qualquer um").
    pub professional_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub slots: Vec<AvailableSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotBookableReason {
    BookingDisabled,
    ServiceInactive,
}

/// "Sem horários hoje" é diferente de "agendamento desligado".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Bookable { days: Vec<AvailabilityDay> },
    NotBookable { reason: NotBookableReason },
}
