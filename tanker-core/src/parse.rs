use crate::{Error, Result};
use time::{Date, OffsetDateTime, PrimitiveDateTime, macros::format_description};

/// Canonical textual form used when binding or staging temporal values;
/// zero-padded so it parses back with [`Parse`].
pub fn format_date(value: &Date) -> String {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .expect("date formatting cannot fail")
}

pub fn format_timestamp(value: &PrimitiveDateTime) -> String {
    value
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
        ))
        .expect("timestamp formatting cannot fail")
}

pub fn format_timestamptz(value: &OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
        ))
        .expect("timestamp formatting cannot fail")
}

/// Lenient parsing of temporal values from their common textual forms.
pub trait Parse {
    fn parse(value: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized;
}

impl Parse for Date {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        time::Date::parse(value, format_description!("[year]-[month]-[day]"))
            .map_err(|_| Error::parse(format!("cannot parse `{}` as a date", value)))
    }
}

impl Parse for PrimitiveDateTime {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        time::PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        )
        .or(time::PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ))
        .or(time::PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        ))
        .or(time::PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ))
        .map_err(|_| Error::parse(format!("cannot parse `{}` as a timestamp", value)))
    }
}

impl Parse for OffsetDateTime {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        time::OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            ),
        )
        .or(time::OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .map_err(|_| Error::parse(format!("cannot parse `{}` as a timestamp with timezone", value)))
    }
}
