use chrono::NaiveDateTime;
use diesel::prelude::*;

/// One RTD probe as configured in the store.
///
/// `pair_id` is asymmetric: the "down" probe of a pair records the id of
/// its "up" counterpart. `nominal_type` doubles as the RTD nominal value
/// in the conversion math.
#[derive(Queryable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::database::schema::probes_t)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Probe {
    pub id: i32,
    pub label: String,
    pub nominal_type: i32,
    pub pin: i32,
    pub location: String,
    pub disabled: bool,
    pub pair_id: Option<i32>,
    pub relay_id: Option<i32>,
    pub low_threshold: Option<f64>,
    pub high_threshold: Option<f64>,
    pub delta: Option<f64>,
    pub wire_resistance: Option<f64>,
    pub correction_resistance: Option<f64>,
}

#[derive(Queryable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::database::schema::relays_t)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Relay {
    pub id: i32,
    pub label: String,
    pub pin: i32,
    pub disabled: bool,
    pub fire_on_threshold: bool,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = crate::database::schema::samples_t)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Sample {
    pub id: i32,
    pub probe_id: i32,
    pub temperature: f64,
    pub recorded_at: NaiveDateTime,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::database::schema::samples_t)]
pub struct NewSample {
    pub probe_id: i32,
    pub temperature: f64,
    pub recorded_at: NaiveDateTime,
}
