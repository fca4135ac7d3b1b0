// src/scheduling/slots.rs
//
// Gera os horários candidatos de um dia a partir dos intervalos abertos
// e da ocupação já existente.

use std::collections::BTreeSet;

use super::calendar_rules::MinuteRange;

/// Parâmetros de um pedido de horário para um profissional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRequest {
    pub duration_minutes: i64,
    pub buffer_minutes: i64,
    pub interval_minutes: i64,
    pub capacity: i64,
}

impl SlotRequest {
    fn step(&self) -> i64 {
        self.interval_minutes.max(1)
    }
}

/// O atendimento cabe inteiro num único intervalo aberto.
pub fn fits(open: &[MinuteRange], candidate: MinuteRange) -> bool {
    !candidate.is_empty() && open.iter().any(|range| range.contains(&candidate))
}

/// Maior número de atendimentos simultâneos dentro de `window`.
pub fn peak_occupancy(occupied: &[MinuteRange], window: MinuteRange) -> i64 {
    let mut edges: Vec<(i64, i64)> = occupied
        .iter()
        .filter_map(|range| range.intersect(&window))
        .flat_map(|range| [(range.start, 1), (range.end, -1)])
        .collect();

    // Saídas antes de entradas no mesmo minuto: intervalos semiabertos
    edges.sort_unstable();

    let mut current = 0;
    let mut peak = 0;
    for (_, delta) in edges {
        current += delta;
        peak = peak.max(current);
    }
    peak
}

/// Ainda há lugar para o atendimento, contando a folga dos dois lados.
pub fn has_capacity(occupied: &[MinuteRange], candidate: MinuteRange, buffer: i64, capacity: i64) -> bool {
    let window = MinuteRange::new(candidate.start - buffer.max(0), candidate.end + buffer.max(0));
    peak_occupancy(occupied, window) < capacity.max(1)
}

/// Mesmo critério usado na listagem e na criação, para que um horário
/// oferecido seja sempre aceito enquanto nada mudar.
pub fn is_bookable(open: &[MinuteRange], occupied: &[MinuteRange], start: i64, request: &SlotRequest) -> bool {
    let candidate = MinuteRange::new(start, start + request.duration_minutes);
    fits(open, candidate) && has_capacity(occupied, candidate, request.buffer_minutes, request.capacity)
}

fn align_up(minute: i64, step: i64) -> i64 {
    minute.div_euclid(step) * step + if minute.rem_euclid(step) == 0 { 0 } else { step }
}

/// Horários de início livres no dia, em ordem crescente e sem repetição.
///
/// Os candidatos ficam na grade `k * interval` contada da meia-noite local,
/// então um intervalo que abre às 09:10 com grade de 15 começa às 09:15.
/// `not_before` descarta o que já passou quando o dia é hoje.
pub fn generate_slots(
    open: &[MinuteRange],
    occupied: &[MinuteRange],
    request: &SlotRequest,
    not_before: Option<i64>,
) -> Vec<i64> {
    if request.duration_minutes <= 0 {
        return Vec::new();
    }

    let step = request.step();
    let mut starts = BTreeSet::new();

    for range in open {
        let mut start = align_up(range.start, step);
        while start + request.duration_minutes <= range.end {
            let too_early = not_before.is_some_and(|limit| start < limit);
            if !too_early && is_bookable(open, occupied, start, request) {
                starts.insert(start);
            }
            start += step;
        }
    }

    starts.into_iter().collect()
}

/// "HH:MM"
pub fn format_minute(minute: i64) -> String {
    format!("{:02}:{:02}", minute.div_euclid(60), minute.rem_euclid(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: i64, end: i64) -> MinuteRange {
        MinuteRange::new(start, end)
    }

    fn hm(h: i64, m: i64) -> i64 {
        h * 60 + m
    }

    fn request(duration: i64, interval: i64) -> SlotRequest {
        SlotRequest {
            duration_minutes: duration,
            buffer_minutes: 0,
            interval_minutes: interval,
            capacity: 1,
        }
    }

    fn times(slots: &[i64]) -> Vec<String> {
        slots.iter().copied().map(format_minute).collect()
    }

    #[test]
    fn monday_morning_grid_ends_where_the_service_still_fits() {
        let open = [r(hm(9, 0), hm(18, 0))];
        let slots = generate_slots(&open, &[], &request(30, 15), None);

        assert_eq!(slots.first().copied(), Some(hm(9, 0)));
        assert_eq!(slots.last().copied(), Some(hm(17, 30)));
        assert_eq!(&times(&slots)[..3], ["09:00", "09:15", "09:30"]);
        // 09:00 .. 17:30 a cada 15 minutos
        assert_eq!(slots.len(), 35);
    }

    #[test]
    fn existing_appointment_removes_overlapping_starts() {
        let open = [r(hm(9, 0), hm(18, 0))];
        let occupied = [r(hm(10, 0), hm(10, 30))];
        let slots = times(&generate_slots(&open, &occupied, &request(30, 15), None));

        for gone in ["09:45", "10:00", "10:15"] {
            assert!(!slots.contains(&gone.to_string()), "{} should be taken", gone);
        }
        for kept in ["09:30", "10:30"] {
            assert!(slots.contains(&kept.to_string()), "{} should be free", kept);
        }
    }

    #[test]
    fn buffer_pushes_neighbours_away() {
        let open = [r(hm(9, 0), hm(12, 0))];
        let occupied = [r(hm(10, 0), hm(10, 30))];
        let mut req = request(30, 15);
        req.buffer_minutes = 10;
        let slots = times(&generate_slots(&open, &occupied, &req, None));

        // 09:30 terminaria às 10:00, colado no atendimento existente
        assert!(!slots.contains(&"09:30".to_string()));
        assert!(!slots.contains(&"10:30".to_string()));
        assert!(slots.contains(&"09:15".to_string()));
        assert!(slots.contains(&"10:45".to_string()));
    }

    #[test]
    fn capacity_allows_parallel_bookings() {
        let open = [r(hm(9, 0), hm(11, 0))];
        let occupied = [r(hm(10, 0), hm(10, 30))];
        let mut req = request(30, 30);
        req.capacity = 2;

        let slots = generate_slots(&open, &occupied, &req, None);
        assert!(slots.contains(&hm(10, 0)));

        let full = [r(hm(10, 0), hm(10, 30)), r(hm(10, 0), hm(10, 30))];
        let slots = generate_slots(&open, &full, &req, None);
        assert!(!slots.contains(&hm(10, 0)));
        assert!(slots.contains(&hm(10, 30)));
    }

    #[test]
    fn back_to_back_occupancy_does_not_stack() {
        // Dois atendimentos encostados nunca estão simultâneos
        let occupied = [r(600, 630), r(630, 660)];
        assert_eq!(peak_occupancy(&occupied, r(600, 660)), 1);
        assert_eq!(peak_occupancy(&occupied, r(660, 700)), 0);
    }

    #[test]
    fn a_service_never_straddles_a_block() {
        // Intervalos já separados pelo almoço
        let open = [r(hm(9, 0), hm(12, 0)), r(hm(13, 0), hm(18, 0))];
        let slots = times(&generate_slots(&open, &[], &request(60, 30), None));

        assert!(slots.contains(&"11:00".to_string()));
        assert!(!slots.contains(&"11:30".to_string()));
        assert!(!slots.contains(&"12:00".to_string()));
        assert!(!slots.contains(&"12:30".to_string()));
        assert!(slots.contains(&"13:00".to_string()));
    }

    #[test]
    fn grid_is_anchored_at_midnight() {
        let open = [r(hm(9, 10), hm(10, 0))];
        let slots = times(&generate_slots(&open, &[], &request(15, 15), None));
        assert_eq!(slots, ["09:15", "09:30", "09:45"]);
    }

    #[test]
    fn past_starts_are_skipped() {
        let open = [r(hm(9, 0), hm(11, 0))];
        let slots = times(&generate_slots(&open, &[], &request(30, 30), Some(hm(9, 40))));
        assert_eq!(slots, ["10:00", "10:30"]);
    }

    #[test]
    fn output_is_sorted_and_repeatable() {
        let open = [r(hm(14, 0), hm(15, 0)), r(hm(9, 0), hm(10, 0))];
        let a = generate_slots(&open, &[], &request(30, 30), None);
        let b = generate_slots(&open, &[], &request(30, 30), None);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn offered_slot_is_accepted_on_booking() {
        let open = [r(hm(9, 0), hm(18, 0))];
        let occupied = [r(hm(10, 0), hm(10, 30))];
        let req = request(45, 15);
        for start in generate_slots(&open, &occupied, &req, None) {
            assert!(is_bookable(&open, &occupied, start, &req));
        }
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_minute(0), "00:00");
        assert_eq!(format_minute(hm(9, 5)), "09:05");
        assert_eq!(format_minute(hm(23, 45)), "23:45");
    }
}
