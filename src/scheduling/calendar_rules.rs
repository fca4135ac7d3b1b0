// src/scheduling/calendar_rules.rs
//
// Resolve as regras estáticas (horário de funcionamento, horário do
// profissional, bloqueios) em intervalos abertos de um dia local.
// Tudo aqui é puro: mesmas entradas, mesma saída.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::models::establishment::{BusinessHours, ProfessionalHours, RecurringTimeBlock, TimeBlock};

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Intervalo semiaberto `[start, end)` em minutos a partir da meia-noite local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteRange {
    pub start: i64,
    pub end: i64,
}

impl MinuteRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Encostar na borda não conta como sobreposição.
    pub fn overlaps(&self, other: &MinuteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &MinuteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &MinuteRange) -> Option<MinuteRange> {
        let range = MinuteRange::new(self.start.max(other.start), self.end.min(other.end));
        (!range.is_empty()).then_some(range)
    }
}

/// Remove `block` de cada intervalo, partindo em dois quando cai no meio.
pub fn subtract(open: Vec<MinuteRange>, block: MinuteRange) -> Vec<MinuteRange> {
    if block.is_empty() {
        return open;
    }

    let mut result = Vec::with_capacity(open.len() + 1);
    for range in open {
        if !range.overlaps(&block) {
            result.push(range);
            continue;
        }
        if block.start > range.start {
            result.push(MinuteRange::new(range.start, block.start));
        }
        if block.end < range.end {
            result.push(MinuteRange::new(block.end, range.end));
        }
    }
    result
}

/// Um dia no calendário local do estabelecimento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDay {
    pub date: NaiveDate,
    pub tz: Tz,
}

impl LocalDay {
    pub fn new(date: NaiveDate, tz: Tz) -> Self {
        Self { date, tz }
    }

    /// Dia local em que `instant` cai, e o minuto dentro dele.
    pub fn containing(instant: DateTime<Utc>, tz: Tz) -> (LocalDay, i64) {
        let local = instant.with_timezone(&tz);
        let day = LocalDay::new(local.date_naive(), tz);
        let minute = i64::from(local.time().num_seconds_from_midnight()) / 60;
        (day, minute)
    }

    /// 0 = domingo .. 6 = sábado
    pub fn weekday(&self) -> i16 {
        self.date.weekday().num_days_from_sunday() as i16
    }

    fn seconds_from_midnight(&self, instant: DateTime<Utc>) -> i64 {
        let local = instant.with_timezone(&self.tz).naive_local();
        (local - self.date.and_time(NaiveTime::MIN)).num_seconds()
    }

    pub fn minute_floor(&self, instant: DateTime<Utc>) -> i64 {
        self.seconds_from_midnight(instant).div_euclid(60)
    }

    pub fn minute_ceil(&self, instant: DateTime<Utc>) -> i64 {
        let seconds = self.seconds_from_midnight(instant);
        seconds.div_euclid(60) + i64::from(seconds.rem_euclid(60) != 0)
    }

    /// Converte um par de instantes num intervalo local que cobre ambos.
    pub fn range_of(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> MinuteRange {
        MinuteRange::new(self.minute_floor(start), self.minute_ceil(end))
    }

    /// Instante UTC de um minuto local. `None` quando cai no buraco do horário de verão.
    pub fn instant_at(&self, minute: i64) -> Option<DateTime<Utc>> {
        let naive = self.date.and_time(NaiveTime::MIN) + Duration::minutes(minute);
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    /// Primeiro instante do dia local (00:00, ou 01:00 quando a meia-noite cai no horário de verão).
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.instant_at(0)
            .or_else(|| self.instant_at(60))
            .unwrap_or_else(|| Utc.from_utc_datetime(&self.date.and_time(NaiveTime::MIN)))
    }

    /// Janela UTC folgada (um dia para cada lado) para buscar linhas no banco.
    pub fn query_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self.date - Duration::days(1);
        let to = self.date + Duration::days(2);
        (
            Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN)),
            Utc.from_utc_datetime(&to.and_time(NaiveTime::MIN)),
        )
    }
}

fn minute_of_time(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) / 60
}

/// Horário do dia; fechar à meia-noite significa fim do dia.
fn hours_range(open: Option<NaiveTime>, close: Option<NaiveTime>) -> Option<MinuteRange> {
    let start = minute_of_time(open?);
    let mut end = minute_of_time(close?);
    if end == 0 && start > 0 {
        end = MINUTES_PER_DAY;
    }
    let range = MinuteRange::new(start, end);
    (!range.is_empty()).then_some(range)
}

fn applies_to(block_professional: Option<Uuid>, professional_id: Uuid) -> bool {
    block_professional.is_none_or(|id| id == professional_id)
}

/// Configuração de calendário de um estabelecimento, já carregada do banco.
#[derive(Debug, Clone, Default)]
pub struct CalendarRules {
    pub business_hours: Vec<BusinessHours>,
    pub professional_hours: Vec<ProfessionalHours>,
    pub recurring_blocks: Vec<RecurringTimeBlock>,
    pub time_blocks: Vec<TimeBlock>,
}

impl CalendarRules {
    /// Horário base do dia: o do estabelecimento, estreitado pelo do profissional quando existe.
    fn base_hours(&self, professional_id: Uuid, weekday: i16) -> Option<MinuteRange> {
        let establishment = self
            .business_hours
            .iter()
            .find(|h| h.weekday == weekday)
            .filter(|h| !h.closed)
            .and_then(|h| hours_range(h.open_time, h.close_time));

        let professional = self
            .professional_hours
            .iter()
            .find(|h| h.professional_id == professional_id && h.weekday == weekday);

        match professional {
            None => establishment,
            Some(h) if h.closed => None,
            Some(h) => {
                let own = hours_range(h.start_time, h.end_time)?;
                establishment?.intersect(&own)
            }
        }
    }

    /// Intervalos abertos do profissional no dia, ordenados e disjuntos.
    pub fn open_intervals(&self, professional_id: Uuid, day: &LocalDay) -> Vec<MinuteRange> {
        let weekday = day.weekday();
        let Some(base) = self.base_hours(professional_id, weekday) else {
            return Vec::new();
        };

        let mut open = vec![base];

        for block in self.recurring_blocks.iter().filter(|b| {
            b.active && b.weekday == weekday && applies_to(b.professional_id, professional_id)
        }) {
            let range = MinuteRange::new(minute_of_time(block.start_time), minute_of_time(block.end_time));
            open = subtract(open, range);
        }

        for block in self
            .time_blocks
            .iter()
            .filter(|b| applies_to(b.professional_id, professional_id))
        {
            open = subtract(open, day.range_of(block.start_at, block.end_at));
        }

        open.retain(|r| !r.is_empty());
        open.sort();
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn r(start: i64, end: i64) -> MinuteRange {
        MinuteRange::new(start, end)
    }

    // 2025-03-10 é uma segunda-feira
    fn monday() -> LocalDay {
        LocalDay::new(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), Sao_Paulo)
    }

    fn week_hours(establishment_id: Uuid) -> Vec<BusinessHours> {
        (0..7)
            .map(|weekday| BusinessHours {
                id: Uuid::new_v4(),
                establishment_id,
                weekday,
                open_time: (weekday != 0).then(|| t(9, 0)),
                close_time: (weekday != 0).then(|| t(18, 0)),
                closed: weekday == 0,
            })
            .collect()
    }

    fn rules() -> (CalendarRules, Uuid, Uuid) {
        let establishment_id = Uuid::new_v4();
        let professional_id = Uuid::new_v4();
        let rules = CalendarRules {
            business_hours: week_hours(establishment_id),
            ..Default::default()
        };
        (rules, establishment_id, professional_id)
    }

    fn recurring(establishment_id: Uuid, professional_id: Option<Uuid>, weekday: i16, from: NaiveTime, to: NaiveTime) -> RecurringTimeBlock {
        RecurringTimeBlock {
            id: Uuid::new_v4(),
            establishment_id,
            professional_id,
            weekday,
            start_time: from,
            end_time: to,
            reason: None,
            active: true,
        }
    }

    #[test]
    fn subtract_splits_trims_and_drops() {
        assert_eq!(subtract(vec![r(0, 100)], r(40, 60)), vec![r(0, 40), r(60, 100)]);
        assert_eq!(subtract(vec![r(0, 100)], r(80, 120)), vec![r(0, 80)]);
        assert_eq!(subtract(vec![r(0, 100)], r(-10, 200)), Vec::<MinuteRange>::new());
        // Encostar na borda não parte o intervalo
        assert_eq!(subtract(vec![r(0, 100)], r(100, 130)), vec![r(0, 100)]);
    }

    #[test]
    fn subtraction_order_does_not_matter() {
        let a = r(30, 50);
        let b = r(40, 70);
        let left = subtract(subtract(vec![r(0, 100)], a), b);
        let right = subtract(subtract(vec![r(0, 100)], b), a);
        assert_eq!(left, right);
        assert_eq!(left, vec![r(0, 30), r(70, 100)]);
    }

    #[test]
    fn open_day_is_a_single_interval() {
        let (rules, _, professional_id) = rules();
        assert_eq!(rules.open_intervals(professional_id, &monday()), vec![r(540, 1080)]);
    }

    #[test]
    fn closed_day_has_no_intervals() {
        let (rules, _, professional_id) = rules();
        let sunday = LocalDay::new(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(), Sao_Paulo);
        assert_eq!(sunday.weekday(), 0);
        assert!(rules.open_intervals(professional_id, &sunday).is_empty());
    }

    #[test]
    fn professional_hours_narrow_establishment_hours() {
        let (mut rules, _, professional_id) = rules();
        rules.professional_hours.push(ProfessionalHours {
            id: Uuid::new_v4(),
            professional_id,
            weekday: 1,
            start_time: Some(t(8, 0)),
            end_time: Some(t(12, 0)),
            closed: false,
        });
        assert_eq!(rules.open_intervals(professional_id, &monday()), vec![r(540, 720)]);

        // Outro profissional continua herdando o horário da casa
        assert_eq!(rules.open_intervals(Uuid::new_v4(), &monday()), vec![r(540, 1080)]);
    }

    #[test]
    fn professional_day_off_closes_the_day() {
        let (mut rules, _, professional_id) = rules();
        rules.professional_hours.push(ProfessionalHours {
            id: Uuid::new_v4(),
            professional_id,
            weekday: 1,
            start_time: None,
            end_time: None,
            closed: true,
        });
        assert!(rules.open_intervals(professional_id, &monday()).is_empty());
    }

    #[test]
    fn recurring_lunch_break_splits_the_day_for_everyone() {
        let (mut rules, establishment_id, professional_id) = rules();
        rules
            .recurring_blocks
            .push(recurring(establishment_id, None, 1, t(12, 0), t(13, 0)));
        assert_eq!(
            rules.open_intervals(professional_id, &monday()),
            vec![r(540, 720), r(780, 1080)]
        );
    }

    #[test]
    fn blocks_of_other_professionals_are_ignored() {
        let (mut rules, establishment_id, professional_id) = rules();
        rules
            .recurring_blocks
            .push(recurring(establishment_id, Some(Uuid::new_v4()), 1, t(12, 0), t(13, 0)));
        let mut inactive = recurring(establishment_id, Some(professional_id), 1, t(9, 0), t(10, 0));
        inactive.active = false;
        rules.recurring_blocks.push(inactive);

        assert_eq!(rules.open_intervals(professional_id, &monday()), vec![r(540, 1080)]);
    }

    #[test]
    fn one_off_block_is_converted_to_local_time() {
        let (mut rules, establishment_id, professional_id) = rules();
        // 13:00–15:00 em São Paulo (UTC-3)
        rules.time_blocks.push(TimeBlock {
            id: Uuid::new_v4(),
            establishment_id,
            professional_id: Some(professional_id),
            start_at: Utc.with_ymd_and_hms(2025, 3, 10, 16, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap(),
            reason: Some("médico".into()),
        });
        assert_eq!(
            rules.open_intervals(professional_id, &monday()),
            vec![r(540, 780), r(900, 1080)]
        );
    }

    #[test]
    fn multi_day_holiday_covers_the_whole_day() {
        let (mut rules, establishment_id, professional_id) = rules();
        rules.time_blocks.push(TimeBlock {
            id: Uuid::new_v4(),
            establishment_id,
            professional_id: None,
            start_at: Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap(),
            reason: Some("feriado".into()),
        });
        assert!(rules.open_intervals(professional_id, &monday()).is_empty());
    }

    #[test]
    fn local_day_round_trips_minutes() {
        let day = monday();
        let instant = day.instant_at(600).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());
        assert_eq!(day.minute_floor(instant), 600);

        let (found, minute) = LocalDay::containing(instant, Sao_Paulo);
        assert_eq!(found, day);
        assert_eq!(minute, 600);
    }

    #[test]
    fn partial_minutes_round_outwards() {
        let day = monday();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 30).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 10, 13, 29, 10).unwrap();
        assert_eq!(day.range_of(start, end), r(600, 630));
    }

    #[test]
    fn closing_at_midnight_means_end_of_day() {
        assert_eq!(hours_range(Some(t(18, 0)), Some(t(0, 0))), Some(r(1080, 1440)));
        assert_eq!(hours_range(Some(t(18, 0)), Some(t(9, 0))), None);
        assert_eq!(hours_range(None, Some(t(9, 0))), None);
    }
}
