// ============================================================================
// Module : calendar
// ============================================================================
// Détermine si une date est un jour ouvré (dias úteis) au Brésil
//
// L'API ne publie pas de cotação le week-end ni les jours fériés nationaux.
// Fonction pure de la date : pas de réseau, pas d'état.
//
// CONCEPT : Trait pour l'injection
// - Le contrôleur reçoit un Arc<dyn BusinessCalendar>
// - Les tests peuvent forcer "jour ouvré" ou "week-end"
// ============================================================================

use std::collections::HashSet;

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};

/// Calendrier des jours ouvrés
pub trait BusinessCalendar: Send + Sync {
    /// Vrai si `date` est un jour ouvré
    fn is_working_day(&self, date: NaiveDate) -> bool;

    /// Même test pour la date locale du jour
    fn is_working_day_today(&self) -> bool {
        self.is_working_day(Local::now().date_naive())
    }
}

/// Fériés nationaux à date fixe (mois, jour)
const FIXED_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),   // Confraternização Universal
    (4, 21),  // Tiradentes
    (5, 1),   // Dia do Trabalho
    (9, 7),   // Independência
    (10, 12), // Nossa Senhora Aparecida
    (11, 2),  // Finados
    (11, 15), // Proclamação da República
    (12, 25), // Natal
];

/// Consciência Negra : férié national depuis 2024
const BLACK_CONSCIOUSNESS_FROM: i32 = 2024;

/// Calendrier brésilien : week-ends + fériés nationaux + fériés additionnels
#[derive(Debug, Clone, Default)]
pub struct BrazilianCalendar {
    extra_holidays: HashSet<NaiveDate>,
}

impl BrazilianCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute des jours fériés (ex: fériés locaux, ponts)
    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            extra_holidays: holidays.into_iter().collect(),
        }
    }

    /// Vrai si la date est un férié (national ou additionnel)
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if self.extra_holidays.contains(&date) {
            return true;
        }

        let (month, day) = (date.month(), date.day());
        if FIXED_HOLIDAYS.contains(&(month, day)) {
            return true;
        }
        if (month, day) == (11, 20) && date.year() >= BLACK_CONSCIOUSNESS_FROM {
            return true;
        }

        movable_holidays(date.year()).contains(&date)
    }
}

impl BusinessCalendar for BrazilianCalendar {
    fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }
}

/// Fériés mobiles dérivés de Pâques : Carnaval (lundi + mardi),
/// Sexta-feira Santa, Corpus Christi
fn movable_holidays(year: i32) -> Vec<NaiveDate> {
    let Some(easter) = easter_sunday(year) else {
        return Vec::new();
    };

    [-48, -47, -2, 60]
        .iter()
        .map(|&offset| easter + Duration::days(offset))
        .collect()
}

/// Dimanche de Pâques (algorithme grégorien anonyme, Meeus/Jones/Butcher)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
