//! Search URL templates, one per date-search strategy.
//!
//! A template is a full search URL whose six leading parameters are `{}`
//! placeholders for the viewport (`ne_lat`, `ne_lng`, `sw_lat`, `sw_lng`,
//! `zoom_level`, `zoom`). Sessions resolve it against a grid cell.
//!
//! Query values are written as-is, without percent-encoding, so the
//! rendered strings are stable fixtures (`query=Vancouver, BC`).

use chrono::{Datelike, Duration, Local, Month, NaiveDate};
use serde::{Deserialize, Serialize};

use super::city::SearchArea;
use crate::error::{HarvestError, Result};
use crate::models::GridCell;

/// Number of placeholders every template carries.
pub const PLACEHOLDER_COUNT: usize = 6;

/// Days between check-in and check-out for the fixed-dates search.
pub const FIXED_STAY_DAYS: i64 = 5;
/// Days between start and end for the multi-month search.
pub const MULTI_MONTH_SPAN_DAYS: i64 = 90;
pub const DEFAULT_MONTHLY_LENGTH: u32 = 3;

/// How a search constrains trip dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateStrategy {
    FlexibleWeek(Vec<Month>),
    FlexibleWeekend(Vec<Month>),
    FlexibleMonth(Vec<Month>),
    FixedDates {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    MultiMonth {
        start: NaiveDate,
        end: NaiveDate,
        length: u32,
    },
}

impl DateStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FlexibleWeek(_) => "flexible-week",
            Self::FlexibleWeekend(_) => "flexible-weekend",
            Self::FlexibleMonth(_) => "flexible-month",
            Self::FixedDates { .. } => "fixed-dates",
            Self::MultiMonth { .. } => "multi-month",
        }
    }
}

/// A query parameter value; sequences expand to one pair per element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamValue {
    One(String),
    Many(Vec<String>),
}

/// An unresolved search URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchUrlTemplate {
    pub strategy: DateStrategy,
    url: String,
}

impl SearchUrlTemplate {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Fill the viewport placeholders for one cell.
    ///
    /// `zoom` is used for both `zoom_level` and `zoom`.
    pub fn resolve(&self, cell: &GridCell, zoom: f64) -> String {
        let values: [f64; PLACEHOLDER_COUNT] = [
            cell.ne_lat,
            cell.ne_lon,
            cell.sw_lat,
            cell.sw_lon,
            zoom,
            zoom,
        ];

        let mut out = String::with_capacity(self.url.len() + 96);
        let mut rest = self.url.as_str();
        for value in values {
            match rest.find("{}") {
                Some(pos) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(&value.to_string());
                    rest = &rest[pos + 2..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out
    }
}

/// Builds search templates for one search area.
#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    area: SearchArea,
    today: NaiveDate,
}

impl SearchUrlBuilder {
    pub fn new(area: SearchArea) -> Self {
        Self {
            area,
            today: Local::now().date_naive(),
        }
    }

    /// Pin "today" so date defaults are reproducible.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn default_params(&self) -> Vec<(&'static str, ParamValue)> {
        let placeholder = || ParamValue::One("{}".to_string());
        vec![
            ("ne_lat", placeholder()),
            ("ne_lng", placeholder()),
            ("sw_lat", placeholder()),
            ("sw_lng", placeholder()),
            ("zoom_level", placeholder()),
            ("zoom", placeholder()),
            ("search_by_map", ParamValue::One("true".to_string())),
            ("tab_id", ParamValue::One("home_tab".to_string())),
            ("refinement_paths[]", ParamValue::One("/homes".to_string())),
            ("query", ParamValue::One(self.area.query.clone())),
            ("place_id", ParamValue::One(self.area.place_id.clone())),
        ]
    }

    fn params_string(params: &[(&'static str, ParamValue)]) -> String {
        let mut pairs = Vec::new();
        for (key, value) in params {
            match value {
                ParamValue::One(v) => pairs.push(format!("{}={}", key, v)),
                ParamValue::Many(vs) => {
                    for v in vs {
                        pairs.push(format!("{}={}", key, v));
                    }
                }
            }
        }
        pairs.join("&")
    }

    fn month_names(&self, months: &[Month]) -> Vec<String> {
        let months = if months.is_empty() {
            current_months(self.today, 1)
        } else {
            months.to_vec()
        };
        months.iter().map(|m| m.name().to_lowercase()).collect()
    }

    /// Render the template for one strategy.
    pub fn build(&self, strategy: DateStrategy) -> SearchUrlTemplate {
        let mut params = self.default_params();

        match &strategy {
            DateStrategy::FlexibleWeek(months)
            | DateStrategy::FlexibleWeekend(months)
            | DateStrategy::FlexibleMonth(months) => {
                let trip_length = match &strategy {
                    DateStrategy::FlexibleWeek(_) => "one_week",
                    DateStrategy::FlexibleWeekend(_) => "weekend_trip",
                    _ => "one_month",
                };
                params.push((
                    "flexible_trip_lengths[]",
                    ParamValue::One(trip_length.to_string()),
                ));
                params.push((
                    "flexible_trip_dates[]",
                    ParamValue::Many(self.month_names(months)),
                ));
            }
            DateStrategy::FixedDates {
                check_in,
                check_out,
            } => {
                params.push(("checkin", ParamValue::One(format_date(check_in))));
                params.push(("checkout", ParamValue::One(format_date(check_out))));
                params.push((
                    "flexible_date_search_filter_type",
                    ParamValue::One("1".to_string()),
                ));
            }
            DateStrategy::MultiMonth { start, end, length } => {
                params.push(("monthly_start_date", ParamValue::One(format_date(start))));
                params.push(("monthly_end_date", ParamValue::One(format_date(end))));
                params.push(("monthly_length", ParamValue::One(length.to_string())));
                params.push((
                    "flexible_date_search_filter_type",
                    ParamValue::One("6".to_string()),
                ));
            }
        }

        let url = format!("{}?{}", self.area.base_url(), Self::params_string(&params));
        SearchUrlTemplate { strategy, url }
    }

    pub fn flexible_week(&self, months: &[Month]) -> SearchUrlTemplate {
        self.build(DateStrategy::FlexibleWeek(months.to_vec()))
    }

    pub fn flexible_weekend(&self, months: &[Month]) -> SearchUrlTemplate {
        self.build(DateStrategy::FlexibleWeekend(months.to_vec()))
    }

    pub fn flexible_month(&self, months: &[Month]) -> SearchUrlTemplate {
        self.build(DateStrategy::FlexibleMonth(months.to_vec()))
    }

    pub fn fixed_dates(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<SearchUrlTemplate> {
        if check_out <= check_in {
            return Err(HarvestError::InvalidInput(format!(
                "check-out {} is not after check-in {}",
                check_out, check_in
            )));
        }
        Ok(self.build(DateStrategy::FixedDates {
            check_in,
            check_out,
        }))
    }

    pub fn multi_month(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        length: u32,
    ) -> Result<SearchUrlTemplate> {
        if end <= start {
            return Err(HarvestError::InvalidInput(format!(
                "multi-month end {} is not after start {}",
                end, start
            )));
        }
        Ok(self.build(DateStrategy::MultiMonth { start, end, length }))
    }

    /// All five templates, in crawl order: flexible month, week, weekend,
    /// then multi-month and fixed dates.
    ///
    /// With no months given, the current month and the next two are used.
    pub fn get_urls(&self, months: &[Month]) -> Vec<SearchUrlTemplate> {
        let months = if months.is_empty() {
            current_months(self.today, 3)
        } else {
            months.to_vec()
        };
        let today = self.today;

        vec![
            self.build(DateStrategy::FlexibleMonth(months.clone())),
            self.build(DateStrategy::FlexibleWeek(months.clone())),
            self.build(DateStrategy::FlexibleWeekend(months)),
            self.build(DateStrategy::MultiMonth {
                start: today,
                end: today + Duration::days(MULTI_MONTH_SPAN_DAYS),
                length: DEFAULT_MONTHLY_LENGTH,
            }),
            self.build(DateStrategy::FixedDates {
                check_in: today,
                check_out: today + Duration::days(FIXED_STAY_DAYS),
            }),
        ]
    }
}

impl Default for SearchUrlBuilder {
    fn default() -> Self {
        Self::new(SearchArea::default())
    }
}

/// The month of `today` and the following `count - 1`, wrapping past December.
pub fn current_months(today: NaiveDate, count: usize) -> Vec<Month> {
    let count = count.clamp(1, 12);
    let mut month = Month::try_from(today.month() as u8).unwrap_or(Month::January);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(month);
        month = month.succ();
    }
    out
}

/// Parse month names like "august" or "Aug".
pub fn parse_months(names: &[String]) -> Result<Vec<Month>> {
    names
        .iter()
        .map(|name| {
            name.trim()
                .parse::<Month>()
                .map_err(|_| HarvestError::InvalidInput(format!("unknown month '{}'", name)))
        })
        .collect()
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
